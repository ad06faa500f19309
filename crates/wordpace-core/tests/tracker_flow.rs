use chrono::NaiveDate;
use std::cell::Cell;
use std::rc::Rc;
use wordpace_core::settings::MemorySettingsStore;
use wordpace_core::{
    count_words, Clock, JsonSettingsStore, Rollover, SaveOutcome, Settings, SettingsStore, Tracker,
};

#[derive(Clone)]
struct SteppedClock(Rc<Cell<NaiveDate>>);

impl SteppedClock {
    fn at(y: i32, m: u32, d: u32) -> Self {
        Self(Rc::new(Cell::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())))
    }

    fn advance_day(&self) {
        self.0.set(self.0.get().succ_opt().unwrap());
    }
}

impl Clock for SteppedClock {
    fn today(&self) -> NaiveDate {
        self.0.get()
    }
}

#[test]
fn counts_words_across_scripts() {
    assert_eq!(count_words(""), 0);
    assert_eq!(count_words("hello world"), 2);
    assert_eq!(count_words("你好"), 2);
    assert_eq!(count_words("hello 你好 world"), 4);
}

#[test]
fn day_total_is_sum_of_file_deltas() {
    let clock = SteppedClock::at(2024, 1, 1);
    let mut tracker = Tracker::load(MemorySettingsStore::default(), clock, "vault").unwrap();

    tracker.on_document_changed("A.md", &"w ".repeat(10));
    tracker.on_document_changed("B.md", &"w ".repeat(5));
    tracker.on_document_changed("A.md", &"w ".repeat(15));
    let update = tracker.on_document_changed("B.md", &"w ".repeat(5));

    assert_eq!(update.total, 5);
    assert_eq!(tracker.day_counts()["2024-01-01"], 5);
}

#[test]
fn rollover_then_edit_starts_a_fresh_day() {
    let clock = SteppedClock::at(2024, 1, 1);
    let mut tracker =
        Tracker::load(MemorySettingsStore::default(), clock.clone(), "vault").unwrap();

    tracker.on_document_changed("F.md", "a");
    tracker.on_document_changed("F.md", "a b c d e f");
    assert_eq!(tracker.current_word_count(), 5);

    clock.advance_day();
    let (rollover, saved) = tracker.tick();
    assert_eq!(
        rollover,
        Rollover::Rolled {
            from: "2024-01-01".to_string(),
            to: "2024-01-02".to_string(),
        }
    );
    assert_eq!(saved.unwrap(), SaveOutcome::Saved);
    // Yesterday's total stays on display until the next edit
    assert_eq!(tracker.status_text(), "5 words today");

    let update = tracker.on_document_changed("F.md", "a b c d e f");
    assert_eq!(update.total, 0);
    let update = tracker.on_document_changed("F.md", "a b c d e f g h i");
    assert_eq!(update.total, 3);

    assert_eq!(tracker.day_counts()["2024-01-01"], 5);
    assert_eq!(tracker.day_counts()["2024-01-02"], 3);
    assert_eq!(tracker.aggregator().todays_word_count().len(), 1);
}

#[test]
fn empty_history_does_not_overwrite_saved_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let store = JsonSettingsStore::new(&path);

    let mut persisted = Settings::default();
    persisted.day_counts.insert("2024-01-01".to_string(), 50);
    store.write(&persisted).unwrap();

    let outcome = store.save(&Settings::default()).unwrap();
    assert_eq!(outcome, SaveOutcome::SkippedEmpty);
    assert_eq!(
        JsonSettingsStore::new(&path).load().unwrap().day_counts["2024-01-01"],
        50
    );
}

#[test]
fn state_survives_restart_on_same_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault").join("data.json");
    let clock = SteppedClock::at(2024, 5, 20);

    {
        let mut tracker =
            Tracker::load(JsonSettingsStore::new(&path), clock.clone(), "vault").unwrap();
        tracker.on_document_changed("draft.md", "one two");
        tracker.on_document_changed("draft.md", "one two three four");
        assert_eq!(tracker.save().unwrap(), SaveOutcome::Saved);
    }

    let mut tracker = Tracker::load(JsonSettingsStore::new(&path), clock, "vault").unwrap();
    assert_eq!(tracker.current_word_count(), 2);

    let update = tracker.on_document_changed("draft.md", "one two three four five");
    assert_eq!(update.total, 3);
}

#[test]
fn restart_on_a_new_day_rebaselines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    let clock = SteppedClock::at(2024, 5, 20);

    {
        let mut tracker =
            Tracker::load(JsonSettingsStore::new(&path), clock.clone(), "vault").unwrap();
        tracker.on_document_changed("draft.md", "one");
        tracker.on_document_changed("draft.md", "one two three");
        tracker.save().unwrap();
    }

    clock.advance_day();
    let mut tracker = Tracker::load(JsonSettingsStore::new(&path), clock, "vault").unwrap();
    assert_eq!(tracker.current_word_count(), 0);

    let update = tracker.on_document_changed("draft.md", "one two three four");
    assert_eq!(update.total, 0);
    assert_eq!(tracker.day_counts()["2024-05-20"], 2);
}
