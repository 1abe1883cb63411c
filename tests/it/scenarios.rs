use cotest::*;

use crate::{example1, init_tracing, Service, ServiceMock};

#[test]
fn call_from_test_thread_is_returned_by_coroutine() {
    init_tracing();
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let coro = cotest.coroutine("returns ten", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);

            let call = co.wait_for_call(&m, ServiceMock::mock1);
            assert_eq!(200, *call.arg::<0>());
            call.returns(10);
        }
    });

    assert_eq!(10, m.mock1(200));
    drop(coro);
}

#[test]
fn wildcard_watch_sees_calls_in_call_order() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let coro = cotest.coroutine("wildcard", {
        let m = m.clone();
        move |co| {
            co.watch_all();

            let first = co.wait_for_any_call();
            assert_eq!("Service::mock2", first.name());
            first.returns_unit();

            let second = co.wait_for_any_call();
            assert_eq!("Service::mock1", second.name());
            second
                .is_call(&m, ServiceMock::mock1)
                .unwrap()
                .returns(1);
        }
    });

    m.mock2();
    assert_eq!(1, m.mock1(0));
    drop(coro);
}

#[test]
fn launch_result_follows_its_mock_call() {
    init_tracing();
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("launcher", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            let launch = co.launch({
                let m = m.clone();
                move || example1(&m, 4)
            });

            let event = co.next_event();
            let call = event
                .is_call(&m, ServiceMock::mock1)
                .and_then(|call| call.from(&launch))
                .unwrap();
            assert_eq!(5, *call.arg::<0>());
            call.returns(1000);

            let event = co.next_event();
            assert!(event.is_result(&launch).is_some());
            assert_eq!(2000, event.result(&launch));
        }
    });
}

#[test]
fn expectation_declared_after_watch_takes_its_own_calls() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let coro = cotest.coroutine("mock1 only", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            co.wait_for_call(&m, ServiceMock::mock1).returns(42);
        }
    });
    m.expect(ServiceMock::mock2, matching!());

    m.mock2();
    assert_eq!(42, m.mock1(1));
    drop(coro);
}

#[test]
fn satisfied_coroutine_exiting_without_calls_is_fine() {
    let cotest = Cotest::new();

    let coro = cotest.coroutine("idle", |co| {
        co.satisfy();
    });

    assert!(coro.is_exited());
}

#[test]
#[should_panic(expected = "over-saturated and active")]
fn call_after_coroutine_exit_oversaturates_its_watch() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("one shot", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            co.wait_for_call(&m, ServiceMock::mock1).returns(10);
        }
    });

    assert_eq!(10, m.mock1(1));
    assert_eq!(0, m.mock1(2));
}
