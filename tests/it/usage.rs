use cotest::*;

use crate::{Service, ServiceMock};

#[test]
#[should_panic(
    expected = "cotest usage error: Service::mock1: Cannot invoke mock functions from within test coroutines"
)]
fn mock_call_from_coroutine_body() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("caller", move |_| {
        m.mock1(1);
    });
}

#[test]
#[should_panic(expected = "while the mock call Service::mock1(1) is neither accepted nor dropped")]
fn next_event_with_unresolved_call() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("greedy", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            let _first = co.next_event();
            co.next_event();
        }
    });

    m.mock1(1);
}

#[test]
#[should_panic(expected = "which blocked without returning or dropping it")]
fn accepted_call_never_returned_while_blocked() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("hoarder", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            let _call = co.wait_for_call(&m, ServiceMock::mock1);
            co.next_event();
        }
    });

    m.mock1(1);
}

#[test]
#[should_panic(
    expected = "exited without returning from the accepted mock call Service::mock1(1)"
)]
fn exit_with_accepted_call() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("quitter", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            co.wait_for_call(&m, ServiceMock::mock1);
        }
    });

    m.mock1(1);
}

#[test]
#[should_panic(expected = "cotest usage error: Dropping a launch result is not allowed")]
fn dropping_launch_result() {
    let cotest = Cotest::new();

    let _coro = cotest.coroutine("careless", |co| {
        let _launch = co.launch(|| 1);
        co.next_event().drop_call();
    });
}

#[test]
#[should_panic(expected = "was accessed before it was observed with is_result()")]
fn result_before_observing() {
    let cotest = Cotest::new();

    let _coro = cotest.coroutine("impatient", |co| {
        let launch = co.launch(|| 1);
        let event = co.next_event();
        event.result(&launch);
    });
}

#[test]
#[should_panic(expected = "exited without observing the result of the launch at tests/it/usage.rs:")]
fn exit_without_observing_launch() {
    let cotest = Cotest::new();

    let _coro = cotest.coroutine("forgetful", |co| {
        co.launch(|| 1);
    });
}

#[test]
#[should_panic(expected = "arrived in coroutine \"waiting\" while waiting for Service::mock1")]
fn launch_result_while_waiting_for_call() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("waiting", {
        let m = m.clone();
        move |co| {
            let _launch = co.launch(|| ());
            co.wait_for_call(&m, ServiceMock::mock1);
        }
    });
}

#[test]
#[should_panic(expected = "mock object \"stranger\" belongs to another Cotest")]
fn mock_object_of_another_context() {
    let cotest = Cotest::new();
    let other = Cotest::new();
    let stranger = other.mock_object("stranger");

    let coro = cotest.new_coroutine("confused", |_| {});
    coro.watch_object(&stranger);
}

#[test]
#[should_panic(expected = "cotest usage error: Cotest dropped while coroutines are still alive: survivor")]
fn cotest_dropped_before_coroutine() {
    let cotest = Cotest::new();

    let coro = cotest.coroutine("survivor", |co| {
        co.satisfy();
        co.next_event();
    });

    drop(cotest);
    drop(coro);
}

#[test]
#[should_panic(expected = "coroutines cannot be created from inside a coroutine or a launch")]
fn coroutine_inside_coroutine() {
    let cotest = std::rc::Rc::new(Cotest::new());

    let _coro = cotest.coroutine("outer", {
        let cotest = cotest.clone();
        move |_| {
            cotest.coroutine("inner", |_| {});
        }
    });
}

#[test]
#[should_panic(expected = "cotest usage error: Service::mock1(1) was already accepted")]
fn accepting_twice() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("eager", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            let call = co.wait_for_call(&m, ServiceMock::mock1);
            call.accept();
            call.returns(7);
        }
    });

    m.mock1(1);
}

#[test]
#[should_panic(expected = "cotest usage error: the mock call was already resolved")]
fn dropping_twice_through_a_clone() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_)).returns(3);

    let coro = cotest.coroutine("indecisive", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            let event = co.next_event();
            let copy = event.clone();
            event.drop_call();
            copy.drop_call();
        }
    });

    assert_eq!(3, m.mock1(1));
    drop(coro);
}

#[test]
#[should_panic(expected = "cotest usage error: the mock call was already resolved")]
fn returning_twice_through_a_clone() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let coro = cotest.coroutine("repeater", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            let event = co.next_event();
            let copy = event.clone();
            event.is_call(&m, ServiceMock::mock1).unwrap().returns(1);
            copy.is_call(&m, ServiceMock::mock1).unwrap().returns(2);
        }
    });

    assert_eq!(1, m.mock1(1));
    drop(coro);
}

#[test]
#[should_panic(expected = "cotest usage error: the mock call was already resolved")]
fn returning_a_dropped_call() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock2, matching!());

    let coro = cotest.coroutine("fickle", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            let event = co.next_event();
            event.clone().drop_call();
            event.returns_unit();
        }
    });

    m.mock2();
    drop(coro);
}

#[test]
fn narrowing_is_repeatable_and_side_effect_free() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    let other = cotest.mock_object("other");

    let coro = cotest.coroutine("inspector", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            let event = co.next_event();

            for _ in 0..2 {
                assert!(event.is_object(&m).is_some());
                assert!(event.is_object(&other).is_none());
                assert!(event.is_launch_result().is_none());
                assert!(event.is_call(&other, ServiceMock::mock3).is_none());
                assert!(event.is_call(&m, ServiceMock::mock1).is_none());
                assert!(event
                    .is_call(&m, ServiceMock::mock3)
                    .and_then(|call| call.with_arg::<1>(|n| *n > 10))
                    .is_none());
                assert!(event
                    .from_main()
                    .and_then(|event| event.is_call(&m, ServiceMock::mock3))
                    .and_then(|call| call.with(|(name, _)| name == "x"))
                    .is_none());
            }

            // the failed narrowings left the call pending
            event
                .is_call(&m, ServiceMock::mock3)
                .and_then(|call| call.with_arg::<1>(|n| *n == 3))
                .unwrap()
                .returns("narrowed".to_string());
        }
    });

    assert_eq!("narrowed", m.mock3("y".to_string(), 3));
    drop(coro);
}
