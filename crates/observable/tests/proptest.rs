//! Property-based tests for trellis-observable using proptest.

use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use trellis_observable::{
    bind, default_context, enable_array_observation, process_updates, queue_update, ChangeArgs,
    Model, ModelClass, Observable, ObservableArray, Subscriber, SubscriberSet, Value, ValueExt,
};

struct Noop;

impl Subscriber for Noop {
    fn handle_change(&self, _source: &Value, _args: &ChangeArgs) {}
}

struct Mirror {
    items: RefCell<Vec<Value>>,
}

impl Subscriber for Mirror {
    fn handle_change(&self, _source: &Value, args: &ChangeArgs) {
        if let Some(splices) = args.splices() {
            let mut items = self.items.borrow_mut();
            for splice in splices {
                let end = splice.index + splice.removed.len();
                items.splice(splice.index..end, splice.added.iter().cloned());
            }
        }
    }
}

#[derive(Clone, Debug)]
enum ArrayOp {
    Push(i32),
    Pop,
    Shift,
    Unshift(i32),
    Splice(usize, usize, Vec<i32>),
    Reverse,
}

fn array_op() -> impl Strategy<Value = ArrayOp> {
    prop_oneof![
        any::<i32>().prop_map(ArrayOp::Push),
        Just(ArrayOp::Pop),
        Just(ArrayOp::Shift),
        any::<i32>().prop_map(ArrayOp::Unshift),
        (0usize..12, 0usize..4, prop::collection::vec(any::<i32>(), 0..3))
            .prop_map(|(start, count, items)| ArrayOp::Splice(start, count, items)),
        Just(ArrayOp::Reverse),
    ]
}

proptest! {
    /// Only the third distinct subscriber moves a set to vector storage,
    /// and membership survives the move.
    #[test]
    fn third_distinct_subscriber_spills(
        picks in prop::collection::vec(0usize..5, 1..30),
        unsubscribe_first in any::<bool>()
    ) {
        let pool: Vec<Rc<dyn Subscriber>> = (0..5).map(|_| Rc::new(Noop) as Rc<dyn Subscriber>).collect();
        let set = SubscriberSet::detached();
        let mut subscribed: Vec<usize> = Vec::new();

        for &pick in &picks {
            let was_spilled = set.is_spilled();
            set.subscribe(&pool[pick]);
            if !subscribed.contains(&pick) {
                subscribed.push(pick);
            }
            if !was_spilled {
                prop_assert_eq!(set.is_spilled(), subscribed.len() >= 3);
            }
            for &s in &subscribed {
                prop_assert!(set.has(&pool[s]));
            }
        }

        if unsubscribe_first {
            let first = subscribed.remove(0);
            let spilled = set.is_spilled();
            set.unsubscribe(&pool[first]);
            prop_assert!(!set.has(&pool[first]));
            prop_assert_eq!(set.is_spilled(), spilled);
            set.subscribe(&pool[first]);
            prop_assert!(set.has(&pool[first]));
        }
    }

    /// Queued tasks run exactly once, in the order they were queued.
    #[test]
    fn drain_is_fifo(count in 0usize..3000) {
        let log = Rc::new(RefCell::new(Vec::with_capacity(count)));
        for i in 0..count {
            let log = log.clone();
            queue_update(move || {
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        process_updates();
        let expected: Vec<usize> = (0..count).collect();
        prop_assert_eq!(&*log.borrow(), &expected);
    }

    /// Replaying delivered splices on a copy reproduces the array.
    #[test]
    fn splices_replay_to_same_array(
        initial in prop::collection::vec(any::<i32>(), 0..8),
        ops in prop::collection::vec(array_op(), 0..20)
    ) {
        enable_array_observation();
        let array = ObservableArray::from_vec(initial.iter().copied().map(Value::from).collect());
        let mirror = Rc::new(Mirror { items: RefCell::new(array.to_vec()) });
        let subscriber: Rc<dyn Subscriber> = mirror.clone();
        Observable::get_notifier(&array.to_value()).unwrap().subscribe(&subscriber, None);

        for op in ops {
            match op {
                ArrayOp::Push(v) => array.push(v),
                ArrayOp::Pop => { array.pop(); }
                ArrayOp::Shift => { array.shift(); }
                ArrayOp::Unshift(v) => array.unshift(v),
                ArrayOp::Splice(start, count, items) => {
                    array.splice(start, count, items.into_iter().map(Value::from).collect());
                }
                ArrayOp::Reverse => array.reverse(),
            }
        }
        process_updates();
        prop_assert_eq!(&*mirror.items.borrow(), &array.to_vec());
    }

    /// Re-observing a non-volatile binding with unchanged values keeps the
    /// same dependencies and raises no notifications.
    #[test]
    fn stable_observe_is_idempotent(name in "[a-z]{1,8}", rounds in 1usize..5) {
        let class = ModelClass::with_properties("Person", None, &["first", "last"]);
        let person = Model::with_fields(&class, [("first", name.as_str()), ("last", "x")]).to_value();

        let hits = Rc::new(Cell::new(0));
        struct Hit(Rc<Cell<usize>>);
        impl Subscriber for Hit {
            fn handle_change(&self, _source: &Value, _args: &ChangeArgs) {
                self.0.set(self.0.get() + 1);
            }
        }
        let subscriber: Rc<dyn Subscriber> = Rc::new(Hit(hits.clone()));
        let observer = Observable::binding(
            bind(|x, _| format!("{} {}", x.prop("first"), x.prop("last"))),
            Some(&subscriber),
        );

        let context = default_context();
        let first = observer.observe(&person, &context);
        let deps = observer.dependencies();
        for _ in 0..rounds {
            prop_assert_eq!(observer.observe(&person, &context), first.clone());
            let again = observer.dependencies();
            prop_assert_eq!(again.len(), deps.len());
            for (a, b) in again.iter().zip(deps.iter()) {
                prop_assert!(a.0.same(&b.0));
                prop_assert_eq!(&a.1, &b.1);
            }
        }
        process_updates();
        prop_assert_eq!(hits.get(), 0);
    }
}
