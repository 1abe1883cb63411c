use std::cell::Cell;
use std::rc::Rc;

use cotest::*;

use crate::{Service, ServiceMock};

#[test]
fn newer_coroutine_sees_calls_first_and_drops_to_older() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let older = cotest.coroutine("older", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            co.wait_for_call(&m, ServiceMock::mock1).returns(1);
        }
    });
    let newer = cotest.coroutine("newer", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            let event = co.next_event();
            assert!(event.is_call(&m, ServiceMock::mock1).is_some());
            event.drop_call();
            co.retire();
        }
    });

    assert_eq!(1, m.mock1(0));
    drop(newer);
    drop(older);
}

#[test]
fn overlapping_watches_of_one_coroutine_deliver_once() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_)).returns(7);

    let coro = cotest.coroutine("overlap", {
        let m = m.clone();
        move |co| {
            co.watch_all();
            co.watch_object(&m);
            co.watch_call(&m, ServiceMock::mock1);

            co.next_event().drop_call();

            // the dropped call went to the expectation, not to another watch
            let event = co.next_event();
            assert_eq!("Service::mock2", event.name());
            event.returns_unit();
        }
    });

    assert_eq!(7, m.mock1(0));
    m.mock2();
    drop(coro);
}

#[test]
fn retired_coroutine_falls_through_to_expectation() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_)).returns(99);

    let coro = cotest.coroutine("retiring", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            co.wait_for_call(&m, ServiceMock::mock1).returns(1);
            co.retire();
        }
    });

    assert_eq!(1, m.mock1(0));
    assert_eq!(99, m.mock1(0));
    drop(coro);
}

#[test]
fn retire_from_outside_declines_further_calls() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_)).times(2).returns(3);

    let coro = cotest.coroutine("waiting", {
        let m = m.clone();
        move |co| {
            co.watch_call(&m, ServiceMock::mock1);
            co.next_event();
        }
    });
    coro.retire();
    coro.satisfy();

    assert_eq!(3, m.mock1(0));
    assert_eq!(3, m.mock1(1));
    assert!(!coro.is_exited());
}

#[test]
fn matching_watch_only_sees_matching_calls() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_)).returns(0);

    let coro = cotest.coroutine("small numbers", {
        let m = m.clone();
        move |co| {
            co.watch_call_matching(&m, ServiceMock::mock1, matching!(1 | 2));
            co.wait_for_call_matching(&m, ServiceMock::mock1, matching!(2))
                .returns(20);
        }
    });

    assert_eq!(0, m.mock1(100));
    assert_eq!(20, m.mock1(2));
    drop(coro);
}

#[test]
fn deferred_coroutine_starts_on_first_watched_call() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    let started = Rc::new(Cell::new(false));

    let coro = cotest.new_coroutine("lazy", {
        let m = m.clone();
        let started = started.clone();
        move |co| {
            started.set(true);
            co.wait_for_call(&m, ServiceMock::mock1).returns(3);
        }
    });
    coro.watch_call(&m, ServiceMock::mock1);
    assert!(!started.get());

    assert_eq!(3, m.mock1(0));
    assert!(started.get());
    drop(coro);
}

#[test]
fn deferred_coroutine_started_explicitly() {
    let cotest = Cotest::new();
    let started = Rc::new(Cell::new(false));

    let coro = cotest.new_coroutine("explicit", {
        let started = started.clone();
        move |_| started.set(true)
    });
    assert!(!started.get());

    coro.start();
    assert!(started.get());
    assert!(coro.is_exited());
}

#[test]
fn satisfied_coroutine_may_stay_blocked() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");

    let coro = cotest.coroutine("forever", {
        let m = m.clone();
        move |co| {
            co.watch_object(&m);
            co.satisfy();
            loop {
                co.wait_for_any_call().returns_unit();
            }
        }
    });

    m.mock2();
    m.mock2();
    assert!(!coro.is_exited());
}

#[test]
fn declined_call_skips_coroutine_that_exited_meanwhile() {
    let cotest = Cotest::new();
    let m = cotest.mock_object("m");
    m.expect(ServiceMock::mock1, matching!(_)).returns(99);

    let early = cotest.coroutine("early", |co| {
        co.watch_all();
        co.next_event().drop_call();
        co.satisfy();
    });
    let late = cotest.new_coroutine("late", |co| {
        co.next_event().drop_call();
        co.retire();
    });
    late.watch_object(&m);
    early.watch_call(&m, ServiceMock::mock1);

    // starting "late" lets "early" run to its exit before its older watch is reached
    assert_eq!(99, m.mock1(1));
    assert!(cotest.take_failures().is_empty());

    drop(late);
    drop(early);
}
