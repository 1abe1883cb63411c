use cotest::*;

#[mock(api = CatalogMock)]
trait Catalog {
    fn find(&self, title: String, year: u32) -> Option<u32>;
    fn scan(&self, bytes: Vec<u8>) -> bool;
    fn tag(&self, label: Option<String>);
}

#[test]
fn string_literal_matches_owned_string() {
    let cotest = Cotest::new();
    let catalog = cotest.mock_object("catalog");

    catalog
        .expect(CatalogMock::find, matching!("Dune", _))
        .returns(Some(1));
    catalog
        .expect(CatalogMock::find, matching!("Solaris", 1961 | 1972))
        .times(2)
        .returns(Some(2));

    assert_eq!(Some(1), catalog.find("Dune".to_string(), 1965));
    assert_eq!(Some(2), catalog.find("Solaris".to_string(), 1961));
    assert_eq!(Some(2), catalog.find("Solaris".to_string(), 1972));
}

#[test]
fn slice_patterns_match_vectors() {
    let cotest = Cotest::new();
    let catalog = cotest.mock_object("catalog");

    catalog
        .expect(CatalogMock::scan, matching!([0x7f, b'E', ..]))
        .returns(true);
    catalog
        .expect(CatalogMock::scan, matching!([]))
        .returns(false);

    assert!(catalog.scan(vec![0x7f, b'E', b'L', b'F']));
    assert!(!catalog.scan(vec![]));
}

#[test]
fn guards_see_every_argument() {
    let cotest = Cotest::new();
    let catalog = cotest.mock_object("catalog");

    catalog
        .expect(
            CatalogMock::find,
            matching!((title, year) if title.len() as u32 * 1000 > *year),
        )
        .returns(None);

    assert_eq!(None, catalog.find("Neuromancer".to_string(), 1984));
}

#[test]
fn enum_patterns() {
    let cotest = Cotest::new();
    let catalog = cotest.mock_object("catalog");

    catalog
        .expect(CatalogMock::tag, matching!(Some(_)))
        .times(1);
    catalog.expect(CatalogMock::tag, matching!(None)).times(1);

    catalog.tag(None);
    catalog.tag(Some("classic".to_string()));
}

#[test]
fn narrowing_with_patterns_in_coroutine() {
    let cotest = Cotest::new();
    let catalog = cotest.mock_object("catalog");

    let coro = cotest.coroutine("librarian", {
        let catalog = catalog.clone();
        move |co| {
            co.watch_object(&catalog);

            let event = co.next_event();
            assert!(event
                .is_call_matching(&catalog, CatalogMock::find, matching!("Dune", _))
                .is_none());

            // narrowing has no side effects, and can be repeated
            let call = event
                .is_call_matching(&catalog, CatalogMock::find, matching!(_, 1950..=1999))
                .unwrap();
            let again = event.is_call(&catalog, CatalogMock::find).unwrap();
            assert_eq!((String::from("Ubik"), 1969), *again.args());

            call.returns(Some(1969));
        }
    });

    assert_eq!(Some(1969), catalog.find("Ubik".to_string(), 1969));
    drop(coro);
}

#[test]
#[should_panic(expected = "Catalog::find(\"Ubik\", 2000) on mock object \"catalog\": Unexpected mock function call - returning default value.")]
fn pattern_mismatch_is_unexpected() {
    let cotest = Cotest::new();
    let catalog = cotest.mock_object("catalog");

    catalog
        .expect(CatalogMock::find, matching!(_, 1950..=1999))
        .any_number();

    catalog.find("Ubik".to_string(), 2000);
}
