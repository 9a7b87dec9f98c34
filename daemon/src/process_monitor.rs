use anyhow::Result;
use std::collections::HashSet;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info};

/// Platform executable suffix ignored when comparing process names.
const EXE_SUFFIX: &str = ".exe";

/// Lists the names of currently running processes.
pub trait ProcessSource: Send {
    fn running_process_names(&mut self) -> Result<HashSet<String>>;
}

/// [`ProcessSource`] backed by `sysinfo`.
pub struct SysinfoProcessSource {
    sys: System,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn running_process_names(&mut self) -> Result<HashSet<String>> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        Ok(self
            .sys
            .processes()
            .values()
            .map(|p| p.name().to_string_lossy().into_owned())
            .collect())
    }
}

/// Lowercases `name` and strips a trailing `.exe`, so "Game.EXE" and "game" compare equal.
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(EXE_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// Result of a single [`ActivityObserver::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityChange {
    NoChange,
    /// A watched process appeared while none was running.
    Started(String),
    /// The remembered watched process is gone and nothing else watched is running.
    Stopped(String),
}

/// Tracks which single watched process is currently running.
///
/// Only one application is considered "active" at a time. If several watched
/// executables run simultaneously, the first match in the configured list wins.
/// Switching straight from one watched process to another is reported as
/// [`ActivityChange::NoChange`]; the new name is remembered silently.
pub struct ActivityObserver<S> {
    source: S,
    watched: Vec<String>,
    current: Option<String>,
}

impl<S: ProcessSource> ActivityObserver<S> {
    pub fn new(source: S, watched: Vec<String>) -> Self {
        Self {
            source,
            watched: clean_names(watched),
            current: None,
        }
    }

    /// The watched process believed to be running, as configured.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Replaces the watch list. The remembered process survives only if it is
    /// still watched; otherwise it is forgotten and returned.
    pub fn set_watched(&mut self, watched: Vec<String>) -> Option<String> {
        self.watched = clean_names(watched);
        match &self.current {
            Some(cur) if !self.watched.contains(cur) => self.forget(),
            _ => None,
        }
    }

    /// Drops the remembered process without reporting a stop.
    pub fn forget(&mut self) -> Option<String> {
        let forgotten = self.current.take();
        if let Some(name) = &forgotten {
            debug!("forgetting {name}");
        }
        forgotten
    }

    pub fn poll(&mut self) -> ActivityChange {
        let running: HashSet<String> = match self.source.running_process_names() {
            Ok(names) => names.iter().map(|n| normalize_process_name(n)).collect(),
            Err(e) => {
                // A failed enumeration tells us nothing; keep what we remember.
                debug!("process enumeration failed: {e:#}");
                return ActivityChange::NoChange;
            }
        };

        let found = self
            .watched
            .iter()
            .find(|w| running.contains(&normalize_process_name(w)))
            .cloned();

        match (self.current.take(), found) {
            (None, Some(name)) => {
                info!("watched process detected: {name}");
                self.current = Some(name.clone());
                ActivityChange::Started(name)
            }
            (Some(prev), None) => {
                info!("watched process exited: {prev}");
                ActivityChange::Stopped(prev)
            }
            (Some(prev), Some(name)) => {
                if prev != name {
                    debug!("watched process switched from {prev} to {name}");
                }
                self.current = Some(name);
                ActivityChange::NoChange
            }
            (None, None) => ActivityChange::NoChange,
        }
    }
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted process lists. `None` simulates an enumeration failure; an
    /// exhausted script keeps returning the last list.
    #[derive(Clone, Default)]
    pub(crate) struct FakeProcesses {
        script: Arc<Mutex<VecDeque<Option<Vec<String>>>>>,
        last: Arc<Mutex<Vec<String>>>,
    }

    impl FakeProcesses {
        pub(crate) fn push(&self, names: &[&str]) {
            self.script
                .lock()
                .unwrap()
                .push_back(Some(names.iter().map(|s| s.to_string()).collect()));
        }

        pub(crate) fn push_failure(&self) {
            self.script.lock().unwrap().push_back(None);
        }
    }

    impl ProcessSource for FakeProcesses {
        fn running_process_names(&mut self) -> Result<HashSet<String>> {
            match self.script.lock().unwrap().pop_front() {
                Some(Some(names)) => {
                    *self.last.lock().unwrap() = names.clone();
                    Ok(names.into_iter().collect())
                }
                Some(None) => anyhow::bail!("access denied"),
                None => Ok(self.last.lock().unwrap().iter().cloned().collect()),
            }
        }
    }

    fn observer(watched: &[&str]) -> (ActivityObserver<FakeProcesses>, FakeProcesses) {
        let source = FakeProcesses::default();
        let obs = ActivityObserver::new(
            source.clone(),
            watched.iter().map(|s| s.to_string()).collect(),
        );
        (obs, source)
    }

    // ── normalize_process_name ────────────────────────────────────────────────

    #[test]
    fn normalize_strips_exe_and_case() {
        assert_eq!(normalize_process_name("RocketLeague.exe"), "rocketleague");
        assert_eq!(normalize_process_name("GAME.EXE"), "game");
        assert_eq!(normalize_process_name("game"), "game");
        assert_eq!(normalize_process_name(" steam.exe "), "steam");
    }

    #[test]
    fn normalize_only_strips_trailing_suffix() {
        assert_eq!(normalize_process_name("my.exe.helper"), "my.exe.helper");
    }

    // ── poll transitions ──────────────────────────────────────────────────────

    #[test]
    fn start_then_stop() {
        let (mut obs, src) = observer(&["a.exe", "b.exe"]);
        src.push(&[]);
        src.push(&["a"]);
        src.push(&[]);

        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.poll(), ActivityChange::Started("a.exe".to_string()));
        assert_eq!(obs.current(), Some("a.exe"));
        assert_eq!(obs.poll(), ActivityChange::Stopped("a.exe".to_string()));
        assert_eq!(obs.current(), None);
    }

    #[test]
    fn direct_switch_collapses_to_no_change() {
        let (mut obs, src) = observer(&["a.exe", "b.exe"]);
        src.push(&[]);
        src.push(&["a"]);
        src.push(&["b"]);

        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.poll(), ActivityChange::Started("a.exe".to_string()));
        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.current(), Some("b.exe"));
    }

    #[test]
    fn stop_after_switch_names_the_last_remembered_process() {
        let (mut obs, src) = observer(&["a.exe", "b.exe"]);
        src.push(&["a.exe"]);
        src.push(&["b.exe"]);
        src.push(&[]);

        assert_eq!(obs.poll(), ActivityChange::Started("a.exe".to_string()));
        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.poll(), ActivityChange::Stopped("b.exe".to_string()));
    }

    #[test]
    fn first_configured_name_wins() {
        let (mut obs, src) = observer(&["b.exe", "a.exe"]);
        src.push(&["a.exe", "b.exe", "explorer.exe"]);
        assert_eq!(obs.poll(), ActivityChange::Started("b.exe".to_string()));
    }

    #[test]
    fn matching_is_case_insensitive_on_both_sides() {
        let (mut obs, src) = observer(&["EldenRing.EXE"]);
        src.push(&["eldenring.exe"]);
        assert_eq!(obs.poll(), ActivityChange::Started("EldenRing.EXE".to_string()));
    }

    #[test]
    fn steady_state_is_no_change() {
        let (mut obs, src) = observer(&["a.exe"]);
        src.push(&["a.exe"]);
        assert_eq!(obs.poll(), ActivityChange::Started("a.exe".to_string()));
        for _ in 0..5 {
            assert_eq!(obs.poll(), ActivityChange::NoChange);
        }
    }

    #[test]
    fn unwatched_processes_are_ignored() {
        let (mut obs, src) = observer(&["a.exe"]);
        src.push(&["notepad.exe", "explorer.exe"]);
        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.current(), None);
    }

    #[test]
    fn empty_watch_list_never_reports() {
        let (mut obs, src) = observer(&[]);
        src.push(&["a.exe"]);
        assert_eq!(obs.poll(), ActivityChange::NoChange);
    }

    // ── enumeration failures ──────────────────────────────────────────────────

    #[test]
    fn failed_enumeration_is_not_a_stop() {
        let (mut obs, src) = observer(&["a.exe"]);
        src.push(&["a.exe"]);
        src.push_failure();
        src.push(&["a.exe"]);
        src.push(&[]);

        assert_eq!(obs.poll(), ActivityChange::Started("a.exe".to_string()));
        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.current(), Some("a.exe"));
        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.poll(), ActivityChange::Stopped("a.exe".to_string()));
    }

    #[test]
    fn failed_enumeration_while_idle_is_no_change() {
        let (mut obs, src) = observer(&["a.exe"]);
        src.push_failure();
        assert_eq!(obs.poll(), ActivityChange::NoChange);
        assert_eq!(obs.current(), None);
    }

    // ── set_watched ───────────────────────────────────────────────────────────

    #[test]
    fn set_watched_keeps_current_if_still_watched() {
        let (mut obs, src) = observer(&["a.exe"]);
        src.push(&["a.exe"]);
        obs.poll();
        assert_eq!(obs.set_watched(vec!["c.exe".to_string(), "a.exe".to_string()]), None);
        assert_eq!(obs.current(), Some("a.exe"));
    }

    #[test]
    fn set_watched_forgets_unwatched_current() {
        let (mut obs, src) = observer(&["a.exe"]);
        src.push(&["a.exe"]);
        obs.poll();
        assert_eq!(obs.set_watched(vec!["c.exe".to_string()]), Some("a.exe".to_string()));
        assert_eq!(obs.current(), None);

        // Re-watching it later reports a fresh start.
        obs.set_watched(vec!["a.exe".to_string()]);
        assert_eq!(obs.poll(), ActivityChange::Started("a.exe".to_string()));
    }

    #[test]
    fn blank_names_are_dropped() {
        let (mut obs, src) = observer(&["", "  ", "a.exe"]);
        src.push(&[""]);
        assert_eq!(obs.poll(), ActivityChange::NoChange);
    }
}
