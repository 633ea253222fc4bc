use std::cell::Cell;

use super::*;
use crate::lending::{Just, Lazy};

#[test]
fn description_is_available_without_work() {
    let runs = Rc::new(Cell::new(0));
    let counted = Rc::clone(&runs);
    let lazy = Lazy::new(move || {
        counted.set(counted.get() + 1);
        Ok(Lease::detached(Rc::new(7u32)))
    });
    let out = ret("seven", lazy);
    assert_eq!(*out.description(), "seven");
    assert_eq!(runs.get(), 0);
    assert_eq!(*out.lease().unwrap(), 7);
    assert_eq!(runs.get(), 1);
}

#[test]
fn safe_return_accepts_matching_description() {
    let out = safe_return(3u32, || Ok(ret(3u32, Just::new("ok"))));
    assert_eq!(*out.lease().unwrap(), "ok");
}

#[test]
fn safe_return_rejects_mismatch() {
    let out = safe_return(3u32, || Ok(ret(4u32, Just::new("bad"))));
    assert_eq!(*out.description(), 3);
    let err = out.lease().unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn safe_return_defers_producer() {
    let runs = Rc::new(Cell::new(0));
    let counted = Rc::clone(&runs);
    let out = safe_return(1u8, move || {
        counted.set(counted.get() + 1);
        Ok(ret(1u8, Just::new(())))
    });
    assert_eq!(runs.get(), 0);
    drop(out.lease().unwrap());
    drop(out.lease().unwrap());
    assert_eq!(runs.get(), 2);
}

#[test]
fn fold_outputs_keeps_descriptions_in_order() {
    let a = ret(1u8, Just::new(10u32));
    let b = ret(2u8, Just::new(20u32));
    let both = fold_outputs(&[a, b]);
    assert_eq!(both.description(), &vec![1, 2]);
    let values: Vec<u32> = both.lease().unwrap().iter().map(|l| **l).collect();
    assert_eq!(values, vec![10, 20]);
}

#[test]
fn render_from_writes_into_own_value() {
    let seen = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&seen);
    let target = ret("target", Just::new(5u32));
    let input: Rc<dyn Lendable<u32>> = Rc::new(Just::new(2u32));
    let rendered = target.render_from(input, move |x: &u32, y: &u32| {
        sink.set(x * y);
        Ok(())
    });
    assert_eq!(*rendered.description(), "target");
    assert_eq!(*rendered.lease().unwrap(), 5);
    assert_eq!(seen.get(), 10);
}
