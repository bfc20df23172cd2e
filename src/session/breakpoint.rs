//! Breakpoint bookkeeping.
//!
//! Entries are created from `setBreakpoint*` responses and from
//! `breakpointResolved` events, deduped by id. Entries that know their script
//! url survive a child restart: the session re-issues them by url + line on
//! the next ready connection.

use crate::protocol::Location;

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub breakpoint_id: String,
    pub script_id: Option<String>,
    pub script_url: Option<String>,
    pub line_number: u64,
    pub column_number: Option<u64>,
}

impl Breakpoint {
    pub fn from_location(breakpoint_id: String, location: &Location, url: Option<&str>) -> Self {
        Self {
            breakpoint_id,
            script_id: Some(location.script_id.clone()),
            script_url: url.map(ToOwned::to_owned),
            line_number: location.line_number,
            column_number: location.column_number,
        }
    }

    /// A breakpoint registered by url before the script was loaded; it has no
    /// script id until the target resolves it.
    pub fn unresolved(breakpoint_id: String, url: String, line_number: u64) -> Self {
        Self {
            breakpoint_id,
            script_id: None,
            script_url: Some(url),
            line_number,
            column_number: None,
        }
    }
}

#[derive(Default)]
pub struct BreakpointRegistry {
    list: Vec<Breakpoint>,
}

impl BreakpointRegistry {
    /// Insert, replacing any entry with the same id.
    pub fn upsert(&mut self, bp: Breakpoint) {
        match self
            .list
            .iter_mut()
            .find(|known| known.breakpoint_id == bp.breakpoint_id)
        {
            Some(existing) => *existing = bp,
            None => self.list.push(bp),
        }
    }

    /// `breakpointResolved`: attach the location (and the script url, when
    /// the registry caller already knows it) to an existing entry, or record
    /// a fresh one.
    pub fn resolve(&mut self, breakpoint_id: &str, location: &Location, url: Option<&str>) {
        match self
            .list
            .iter_mut()
            .find(|known| known.breakpoint_id == breakpoint_id)
        {
            Some(existing) => {
                existing.script_id = Some(location.script_id.clone());
                existing.line_number = location.line_number;
                existing.column_number = location.column_number;
                // a resolved location names the real url; prefer it over the
                // user-supplied fragment recorded at registration time
                if url.is_some() {
                    existing.script_url = url.map(ToOwned::to_owned);
                }
            }
            None => self.upsert(Breakpoint::from_location(
                breakpoint_id.to_string(),
                location,
                url,
            )),
        }
    }

    pub fn remove(&mut self, breakpoint_id: &str) {
        self.list.retain(|bp| bp.breakpoint_id != breakpoint_id);
    }

    /// First entry whose url contains `url_part` at the given 1-based line.
    pub fn find_by_url_line(&self, url_part: &str, line: u64) -> Option<&Breakpoint> {
        self.list.iter().find(|bp| {
            bp.line_number + 1 == line
                && bp
                    .script_url
                    .as_ref()
                    .is_some_and(|url| url.contains(url_part))
        })
    }

    /// True if some breakpoint sits on this script line (0-based).
    pub fn covers_line(&self, script_id: &str, line_number: u64) -> bool {
        self.list.iter().any(|bp| {
            bp.line_number == line_number && bp.script_id.as_deref() == Some(script_id)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.list.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// `(url, 0-based line)` pairs to re-issue after a restart. Entries that
    /// never learned a url cannot be restored and are dropped with the rest.
    pub fn take_reissue_set(&mut self) -> Vec<(String, u64)> {
        let set = self
            .list
            .iter()
            .filter_map(|bp| bp.script_url.clone().map(|url| (url, bp.line_number)))
            .collect();
        self.list.clear();
        set
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn location(script_id: &str, line: u64) -> Location {
        Location {
            script_id: script_id.to_string(),
            line_number: line,
            column_number: None,
        }
    }

    #[test]
    fn test_upsert_dedupes_by_id() {
        let mut reg = BreakpointRegistry::default();
        reg.upsert(Breakpoint::from_location(
            "bp1".to_string(),
            &location("42", 5),
            Some("/app/a.js"),
        ));
        reg.upsert(Breakpoint::from_location(
            "bp1".to_string(),
            &location("42", 7),
            Some("/app/a.js"),
        ));

        assert_eq!(reg.iter().count(), 1);
        assert_eq!(reg.iter().next().unwrap().line_number, 7);
    }

    #[test]
    fn test_resolve_fills_url_once() {
        let mut reg = BreakpointRegistry::default();
        reg.upsert(Breakpoint::unresolved(
            "bp1".to_string(),
            "/app/other.js".to_string(),
            2,
        ));

        reg.resolve("bp1", &location("7", 2), None);
        let bp = reg.iter().next().unwrap();
        assert_eq!(bp.script_id.as_deref(), Some("7"));
        assert_eq!(bp.script_url.as_deref(), Some("/app/other.js"));

        // resolving an unknown id records it
        reg.resolve("bp2", &location("8", 9), Some("/app/late.js"));
        assert_eq!(reg.iter().count(), 2);
    }

    #[test]
    fn test_find_by_url_line_is_one_based() {
        let mut reg = BreakpointRegistry::default();
        reg.upsert(Breakpoint::from_location(
            "bp1".to_string(),
            &location("42", 5),
            Some("/home/user/app/break.js"),
        ));

        assert!(reg.find_by_url_line("break.js", 6).is_some());
        assert!(reg.find_by_url_line("break.js", 5).is_none());
        assert!(reg.find_by_url_line("missing.js", 6).is_none());
    }

    #[test]
    fn test_reissue_set_skips_urlless_entries() {
        let mut reg = BreakpointRegistry::default();
        reg.upsert(Breakpoint::from_location(
            "bp1".to_string(),
            &location("42", 5),
            Some("/app/a.js"),
        ));
        reg.upsert(Breakpoint::from_location(
            "bp2".to_string(),
            &location("43", 1),
            None,
        ));

        let set = reg.take_reissue_set();
        assert_eq!(set, vec![("/app/a.js".to_string(), 5)]);
        assert!(reg.is_empty());
    }
}
