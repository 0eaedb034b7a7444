use std::cell::RefCell;
use std::rc::Rc;

use accessory_core::characteristic::{
    Access, CharacteristicId, CharacteristicSpec, CharacteristicValue, DefaultValue, Generation,
    ValueFormat, WriteError,
};
use accessory_core::input::Level;
use accessory_core::outputs::{OutputBank, OutputId, OutputSink};
use accessory_core::sync::{ApplyOutcome, Notifier, RemoteWriteHandler, Synchronizer, WriteOrigin};

#[derive(Clone, Debug, PartialEq)]
enum Event {
    Output(OutputId, Level),
    Notify(CharacteristicId, CharacteristicValue, Generation),
}

type Journal = Rc<RefCell<Vec<Event>>>;

struct JournalSink(Journal);

impl OutputSink for JournalSink {
    fn set_output(&mut self, pin: OutputId, level: Level) {
        self.0.borrow_mut().push(Event::Output(pin, level));
    }
}

struct JournalNotifier(Journal);

impl Notifier for JournalNotifier {
    fn notify(&mut self, id: CharacteristicId, value: &CharacteristicValue, generation: Generation) {
        self.0
            .borrow_mut()
            .push(Event::Notify(id, value.clone(), generation));
    }
}

const ON: CharacteristicSpec = CharacteristicSpec::new(
    CharacteristicId::On,
    ValueFormat::Bool,
    DefaultValue::Bool(false),
    Access::ReadWrite,
)
.driving(OutputId::Relay);

const SPEED: CharacteristicSpec = CharacteristicSpec::new(
    CharacteristicId::RotationSpeed,
    ValueFormat::Int {
        min: 0,
        max: 3,
        step: 1,
    },
    DefaultValue::Int(1),
    Access::ReadWrite,
);

fn synchronizer() -> (Synchronizer<JournalSink, JournalNotifier>, Journal) {
    let journal = Journal::default();
    let mut sync = Synchronizer::new(
        OutputBank::new(JournalSink(journal.clone())),
        JournalNotifier(journal.clone()),
    );
    sync.register(ON).expect("register on");
    sync.register(SPEED).expect("register speed");
    (sync, journal)
}

fn notifications(journal: &Journal) -> usize {
    journal
        .borrow()
        .iter()
        .filter(|event| matches!(event, Event::Notify(..)))
        .count()
}

#[test]
fn repeated_identical_write_notifies_once() {
    let (mut sync, journal) = synchronizer();

    let first = sync.apply(CharacteristicId::On, CharacteristicValue::Bool(true), WriteOrigin::Local);
    assert!(matches!(first, Ok(ApplyOutcome::Changed(_))));
    assert_eq!(notifications(&journal), 1);

    let second = sync.apply(CharacteristicId::On, CharacteristicValue::Bool(true), WriteOrigin::Remote);
    assert_eq!(second, Ok(ApplyOutcome::Unchanged));
    assert_eq!(notifications(&journal), 1);
}

#[test]
fn notification_iff_value_differs() {
    let (mut sync, journal) = synchronizer();
    let writes = [1, 1, 2, 3, 3, 3, 0, 1, 1, 2];
    let mut previous = 1;
    let mut expected = 0;

    for value in writes {
        let outcome = sync
            .apply(CharacteristicId::RotationSpeed, CharacteristicValue::Int(value), WriteOrigin::Remote)
            .expect("in-range write");
        if value == previous {
            assert_eq!(outcome, ApplyOutcome::Unchanged, "write of {value}");
        } else {
            expected += 1;
            assert!(outcome.is_changed(), "write of {value}");
        }
        previous = value;
        assert_eq!(notifications(&journal), expected);
    }
}

#[test]
fn generations_strictly_increase() {
    let (mut sync, journal) = synchronizer();
    let mut last = Generation::INITIAL;

    for round in 0..20 {
        let outcome = if round % 3 == 0 {
            sync.toggle(CharacteristicId::On, WriteOrigin::Local)
        } else {
            sync.apply(
                CharacteristicId::RotationSpeed,
                CharacteristicValue::Int(round % 4),
                WriteOrigin::Remote,
            )
        };
        if let Ok(ApplyOutcome::Changed(generation)) = outcome {
            assert!(generation > last);
            last = generation;
        }
    }

    let notified: Vec<Generation> = journal
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Notify(_, _, generation) => Some(*generation),
            Event::Output(..) => None,
        })
        .collect();
    assert!(notified.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(sync.last_generation(), last);
}

#[test]
fn actuator_is_driven_before_notification() {
    let (mut sync, journal) = synchronizer();
    journal.borrow_mut().clear();

    sync.apply(CharacteristicId::On, CharacteristicValue::Bool(true), WriteOrigin::Local)
        .expect("valid write");

    let events = journal.borrow();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Event::Output(OutputId::Relay, Level::High));
    assert!(matches!(
        events[1],
        Event::Notify(CharacteristicId::On, CharacteristicValue::Bool(true), _)
    ));
}

#[test]
fn rejected_writes_have_no_side_effects() {
    let (mut sync, journal) = synchronizer();
    journal.borrow_mut().clear();

    assert_eq!(
        sync.on_remote_write(CharacteristicId::RotationSpeed, CharacteristicValue::Int(4)),
        Err(WriteError::OutOfRange {
            id: CharacteristicId::RotationSpeed,
            value: 4,
        })
    );
    assert_eq!(
        sync.on_remote_write(CharacteristicId::On, CharacteristicValue::Int(1)),
        Err(WriteError::TypeMismatch {
            id: CharacteristicId::On,
        })
    );
    assert_eq!(
        sync.on_remote_write(CharacteristicId::Active, CharacteristicValue::Int(1)),
        Err(WriteError::UnknownCharacteristic {
            id: CharacteristicId::Active,
        })
    );
    assert!(journal.borrow().is_empty());
    assert_eq!(sync.value(CharacteristicId::RotationSpeed), Some(&CharacteristicValue::Int(1)));
}
