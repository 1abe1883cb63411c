use cotest::*;

use crate::{Service, ServiceMock};

#[test]
fn returns_and_answers() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    m.expect(ServiceMock::mock1, matching!(_)).times(2).returns(5);
    m.expect(ServiceMock::mock3, matching!(_, _))
        .at_least(1)
        .answers(|(name, n)| name.repeat(*n as usize));

    assert_eq!(5, m.mock1(1));
    assert_eq!(5, m.mock1(2));
    assert_eq!("abab", m.mock3("ab".to_string(), 2));
}

#[test]
fn default_output_without_responder() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    m.expect(ServiceMock::mock1, matching!(_)).any_number();
    m.expect(ServiceMock::mock2, matching!()).at_most(1);

    assert_eq!(0, m.mock1(1));
    m.mock2();
}

#[test]
fn newest_expectation_wins() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    m.expect(ServiceMock::mock1, matching!(_)).any_number().returns(1);
    m.expect(ServiceMock::mock1, matching!(_)).returns(2);

    assert_eq!(2, m.mock1(0));
    // over-saturates the newer expectation instead of falling through
    assert_eq!(0, m.mock1(0));

    let failures = cotest.take_failures();
    assert_eq!(1, failures.len());
    assert!(failures[0].contains("Expected: to be called exactly once"));
    assert!(failures[0].ends_with("Actual: called twice - over-saturated and active"));
}

#[test]
fn saturated_expectation_retires() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    m.expect(ServiceMock::mock1, matching!(_)).any_number().returns(1);
    m.expect(ServiceMock::mock1, matching!(_))
        .times(2)
        .retires_on_saturation()
        .returns(2);

    assert_eq!(2, m.mock1(0));
    assert_eq!(2, m.mock1(0));
    assert_eq!(1, m.mock1(0));
    assert_eq!(1, m.mock1(0));
}

#[test]
fn expectations_are_verified_when_object_is_dropped() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    m.expect(ServiceMock::mock1, matching!(_)).times(2);
    m.expect(ServiceMock::mock2, matching!()).at_least(1);
    m.mock1(0);

    let clone = m.clone();
    drop(m);
    assert!(cotest.take_failures().is_empty());
    drop(clone);

    let failures = cotest.take_failures();
    assert_eq!(2, failures.len());
    assert!(failures[0].starts_with(
        "Actual function call count doesn't match Service::mock1(_) at tests/it/expectations.rs:"
    ));
    assert!(failures[0].ends_with(
        "Expected: to be called exactly twice\n           Actual: called once - unsatisfied and active"
    ));
    assert!(failures[1].ends_with("Actual: never called - unsatisfied and active"));
}

#[test]
#[should_panic(expected = "Actual: never called - unsatisfied and active")]
fn unsatisfied_expectation_fails_at_teardown() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    m.expect(ServiceMock::mock1, matching!(_));
}

#[test]
fn expectation_behind_coroutine_receives_dropped_calls() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock3, matching!(_, _))
        .answers(|(name, _)| format!("expected {name}"));

    let coro = cotest.coroutine("only bob", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            loop {
                let event = co.next_event();
                match event
                    .is_call(&m, ServiceMock::mock3)
                    .and_then(|call| call.with_arg::<0>(|name| name == "bob"))
                {
                    Some(call) => {
                        call.returns("coroutine bob".to_string());
                        break;
                    }
                    None => event.drop_call(),
                }
            }
        }
    });

    assert_eq!("expected alice", m.mock3("alice".to_string(), 1));
    assert_eq!("coroutine bob", m.mock3("bob".to_string(), 2));
    drop(coro);
}
