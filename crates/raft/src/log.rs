use crate::error::Result;
use hivejar_models::Mutation;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One committed or pending mutation in the replicated log.
///
/// Indexes are 1-based; index 0 is the empty log sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub index: u64,
    pub term: u64,
    pub mutation: Mutation,
}

/// Persisted vote state; must survive restarts so a node never votes
/// twice in the same term. The commit index rides along so a restarted
/// node re-applies exactly the entries it had already committed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct VoteState {
    term: u64,
    voted_for: Option<String>,
    #[serde(default)]
    commit_index: u64,
}

/// Durable mutation log: JSON lines, fsynced on append, plus a small
/// metadata file for term/vote state.
///
/// The in-memory copy is the source of truth for reads; the files exist
/// to survive restarts. Truncation (conflict resolution) rewrites the
/// tail file.
pub struct WalLog {
    wal_path: PathBuf,
    meta_path: PathBuf,
    entries: Vec<LogEntry>,
    vote: VoteState,
}

impl WalLog {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let wal_path = dir.join("wal.jsonl");
        let meta_path = dir.join("raft-meta.json");

        let mut entries = Vec::new();
        if wal_path.exists() {
            let reader = BufReader::new(File::open(&wal_path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                entries.push(serde_json::from_str::<LogEntry>(&line)?);
            }
        }

        let vote = if meta_path.exists() {
            serde_json::from_slice(&fs::read(&meta_path)?)?
        } else {
            VoteState::default()
        };

        Ok(Self {
            wal_path,
            meta_path,
            entries,
            vote,
        })
    }

    pub fn last_index(&self) -> u64 {
        self.entries.last().map(|e| e.index).unwrap_or(0)
    }

    pub fn last_term(&self) -> u64 {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }

    pub fn term_at(&self, index: u64) -> Option<u64> {
        if index == 0 {
            return Some(0);
        }
        self.entry_at(index).map(|e| e.term)
    }

    pub fn entry_at(&self, index: u64) -> Option<&LogEntry> {
        if index == 0 || index > self.last_index() {
            return None;
        }
        self.entries.get((index - 1) as usize)
    }

    /// Entries with `index > from`, cloned for shipping to a peer.
    pub fn entries_after(&self, from: u64) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.index > from)
            .cloned()
            .collect()
    }

    /// Append a new entry authored by the local leader.
    pub fn append(&mut self, term: u64, mutation: Mutation) -> Result<LogEntry> {
        let entry = LogEntry {
            index: self.last_index() + 1,
            term,
            mutation,
        };
        self.append_line(&entry)?;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Install replicated entries starting after `prev_index`, removing
    /// any conflicting suffix first.
    pub fn install(&mut self, prev_index: u64, incoming: Vec<LogEntry>) -> Result<()> {
        let mut needs_rewrite = false;

        for entry in &incoming {
            match self.term_at(entry.index) {
                Some(existing_term) if existing_term == entry.term => {
                    // Already have this entry; replay is a no-op.
                }
                Some(_) => {
                    needs_rewrite = true;
                    break;
                }
                None => {}
            }
        }

        if needs_rewrite {
            self.entries.truncate(prev_index as usize);
        }

        let mut appended = Vec::new();
        for entry in incoming {
            if entry.index == self.last_index() + 1 {
                self.entries.push(entry.clone());
                appended.push(entry);
            }
        }

        if needs_rewrite {
            // Conflicting suffix replaced: the tail file must be rebuilt.
            self.rewrite_wal()?;
        } else {
            for entry in &appended {
                self.append_line(entry)?;
            }
        }
        Ok(())
    }

    pub fn current_term(&self) -> u64 {
        self.vote.term
    }

    pub fn voted_for(&self) -> Option<&str> {
        self.vote.voted_for.as_deref()
    }

    pub fn saved_commit_index(&self) -> u64 {
        self.vote.commit_index
    }

    /// Persist the commit watermark; called as commits advance.
    pub fn save_commit_index(&mut self, commit_index: u64) -> Result<()> {
        if commit_index <= self.vote.commit_index {
            return Ok(());
        }
        self.vote.commit_index = commit_index;
        self.persist_meta()
    }

    /// Persist a term/vote transition before acting on it.
    pub fn save_vote(&mut self, term: u64, voted_for: Option<String>) -> Result<()> {
        self.vote = VoteState {
            term,
            voted_for,
            commit_index: self.vote.commit_index,
        };
        self.persist_meta()
    }

    fn persist_meta(&self) -> Result<()> {
        let tmp = self.meta_path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&serde_json::to_vec(&self.vote)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.meta_path)?;
        Ok(())
    }

    fn append_line(&self, entry: &LogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.wal_path)?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    fn rewrite_wal(&self) -> Result<()> {
        let tmp = self.wal_path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp)?;
            for entry in &self.entries {
                let mut line = serde_json::to_vec(entry)?;
                line.push(b'\n');
                file.write_all(&line)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.wal_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivejar_models::MutationType;

    fn mutation(slug: &str) -> Mutation {
        Mutation {
            mutation_type: MutationType::UpsertTenant,
            tenant_slug: slug.to_string(),
            ts_unix: 1_700_000_000,
            payload: serde_json::json!({"slug": slug}),
        }
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut log = WalLog::open(dir.path()).unwrap();
            log.append(1, mutation("acme")).unwrap();
            log.append(1, mutation("beta")).unwrap();
            assert_eq!(log.last_index(), 2);
        }

        let log = WalLog::open(dir.path()).unwrap();
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.entry_at(1).unwrap().mutation.tenant_slug, "acme");
        assert_eq!(log.entry_at(2).unwrap().mutation.tenant_slug, "beta");
    }

    #[test]
    fn test_install_replaces_conflicting_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = WalLog::open(dir.path()).unwrap();
        log.append(1, mutation("acme")).unwrap();
        log.append(1, mutation("stale")).unwrap();

        let replacement = LogEntry {
            index: 2,
            term: 2,
            mutation: mutation("fresh"),
        };
        log.install(1, vec![replacement]).unwrap();

        assert_eq!(log.last_index(), 2);
        assert_eq!(log.entry_at(2).unwrap().term, 2);
        assert_eq!(log.entry_at(2).unwrap().mutation.tenant_slug, "fresh");
    }

    #[test]
    fn test_install_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = WalLog::open(dir.path()).unwrap();
        log.append(1, mutation("acme")).unwrap();

        let duplicate = log.entry_at(1).unwrap().clone();
        log.install(0, vec![duplicate]).unwrap();
        assert_eq!(log.last_index(), 1);
    }

    #[test]
    fn test_vote_state_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = WalLog::open(dir.path()).unwrap();
            log.save_vote(7, Some("node-2".to_string())).unwrap();
        }

        let log = WalLog::open(dir.path()).unwrap();
        assert_eq!(log.current_term(), 7);
        assert_eq!(log.voted_for(), Some("node-2"));
    }

    #[test]
    fn test_entries_after() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = WalLog::open(dir.path()).unwrap();
        log.append(1, mutation("a")).unwrap();
        log.append(1, mutation("b")).unwrap();
        log.append(1, mutation("c")).unwrap();

        let tail = log.entries_after(1);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].index, 2);
        assert_eq!(tail[1].index, 3);
    }
}
