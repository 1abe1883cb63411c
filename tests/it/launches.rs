use std::cell::Cell;
use std::rc::Rc;

use cotest::*;

use crate::{example1, Service, ServiceMock};

#[test]
fn launch_without_mock_calls_completes_first() {
    let cotest = Cotest::new();

    let _coro = cotest.coroutine("pure", |co| {
        let launch = co.launch(|| 6 * 7);

        let event = co.next_event();
        assert!(event.is_mock_call().is_none());
        assert!(event.is_result(&launch).is_some());
        assert!(launch.is_complete());
        assert_eq!(42, event.result(&launch));
    });
}

#[test]
fn unit_returning_launch() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("unit", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            let launch = co.launch({
                let m = m.clone();
                move || m.mock2()
            });

            co.wait_for_object_call(&m).returns_unit();
            co.wait_for_result(&launch).result(&launch);
        }
    });
}

#[test]
fn static_reference_result_keeps_identity() {
    static ANSWER: i32 = 42;

    let cotest = Cotest::new();

    let _coro = cotest.coroutine("reference", |co| {
        let launch = co.launch(|| &ANSWER);

        let result = co.wait_for_result(&launch).result(&launch);
        assert!(std::ptr::eq(&ANSWER, result));
    });
}

#[test]
fn dual_launches_accepted_then_returned_later() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("dual", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);

            let first = co.launch({
                let m = m.clone();
                move || example1(&m, 1)
            });
            let second = co.launch({
                let m = m.clone();
                move || example1(&m, 2)
            });

            let call1 = co.wait_for_call(&m, ServiceMock::mock1);
            assert!(call1.clone().from(&first).is_some());
            assert_eq!(2, *call1.arg::<0>());

            let call2 = co.wait_for_call(&m, ServiceMock::mock1);
            assert!(call2.clone().from(&second).is_some());
            assert_eq!(3, *call2.arg::<0>());

            // answer in reverse order
            call2.returns(30);
            call1.returns(10);

            assert_eq!(60, co.wait_for_result(&second).result(&second));
            assert_eq!(20, co.wait_for_result(&first).result(&first));
        }
    });
}

#[test]
fn nested_launches_interleave() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("nested", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);

            let outer = co.launch({
                let m = m.clone();
                move || m.mock1(1) + m.mock1(2)
            });

            let call = co.wait_for_call_from(&m, ServiceMock::mock1, &outer);
            assert_eq!(1, *call.arg::<0>());

            // a second launch while the first one is blocked in a call
            let inner = co.launch({
                let m = m.clone();
                move || example1(&m, 10)
            });
            let inner_call = co.wait_for_call_from(&m, ServiceMock::mock1, &inner);
            assert_eq!(11, *inner_call.arg::<0>());

            call.returns(100);
            let call = co.wait_for_call_from(&m, ServiceMock::mock1, &outer);
            assert_eq!(2, *call.arg::<0>());
            call.returns(200);

            inner_call.returns(5);

            let event = co.next_event();
            assert_eq!(300, event.is_result(&outer).unwrap().result(&outer));
            let event = co.next_event();
            assert_eq!(10, event.is_result(&inner).unwrap().result(&inner));
        }
    });
}

#[test]
fn wait_for_call_from_drops_calls_of_other_launches() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_))
        .any_number()
        .answers(|(i,)| i * 10);

    let _coro = cotest.coroutine("picky", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);

            let first = co.launch({
                let m = m.clone();
                move || {
                    let i = m.mock1(1);
                    m.mock1(i + 1)
                }
            });
            let second = co.launch({
                let m = m.clone();
                move || m.mock1(5)
            });

            let call = co.wait_for_call_from(&m, ServiceMock::mock1, &second);
            assert_eq!(5, *call.arg::<0>());
            call.returns(-5);

            assert_eq!(-5, co.wait_for_result(&second).result(&second));
            assert_eq!(110, co.wait_for_result(&first).result(&first));
        }
    });
}

#[test]
fn wait_for_any_call_from_launch() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("any from", {
        let m = m.clone();
        move |co| {
            co.watch_all();
            let launch = co.launch({
                let m = m.clone();
                move || m.mock3("x".to_string(), 1)
            });

            let event = co.wait_for_any_call_from(&launch);
            assert_eq!("Service::mock3", event.name());
            event
                .is_call(&m, ServiceMock::mock3)
                .unwrap()
                .returns("y".to_string());

            assert_eq!("y", co.wait_for_result(&launch).result(&launch));
        }
    });
}

#[test]
fn completed_launch_fibers_are_pooled() {
    let cotest = Cotest::new();
    let runs = Rc::new(Cell::new(0));

    let coro = cotest.coroutine("pool", {
        let runs = runs.clone();
        move |co| {
            for _ in 0..3 {
                let launch = co.launch({
                    let runs = runs.clone();
                    move || runs.set(runs.get() + 1)
                });
                co.wait_for_result(&launch);
            }
        }
    });
    drop(coro);

    assert_eq!(3, runs.get());
    // sequential launches reuse one fiber
    assert_eq!(1, cotest.cleanup_launches());
    assert_eq!(0, cotest.cleanup_launches());
}

#[test]
fn launch_results_may_be_local_values() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let _coro = cotest.coroutine("local", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            let launch = co.launch({
                let m = m.clone();
                move || Rc::new(Cell::new(m.mock1(1)))
            });
            co.wait_for_call(&m, ServiceMock::mock1).returns(5);

            let event = co.wait_for_result(&launch);
            let counter = event.result(&launch);
            counter.set(counter.get() + 1);
            assert_eq!(6, event.result(&launch).get());
        }
    });
}
