/// Author/committer identity for a commit, matching the fields git itself
/// carries. `GIT_AUTHOR_*`/`GIT_COMMITTER_*` environment variables are
/// honoured when no explicit signature is supplied (§6 Environment).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: i64,
    pub tz_offset_minutes: i32,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, time: i64, tz_offset_minutes: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            tz_offset_minutes,
        }
    }

    /// Read `GIT_<prefix>_NAME`/`GIT_<prefix>_EMAIL` (`prefix` is `"AUTHOR"`
    /// or `"COMMITTER"`), falling back to `default_name`/`default_email` if
    /// unset. The timestamp has no environment override in the source CLI
    /// either, so callers always supply `now` themselves.
    pub fn from_env_or(prefix: &str, default_name: &str, default_email: &str, now: i64) -> Self {
        let name = std::env::var(format!("GIT_{prefix}_NAME")).unwrap_or_else(|_| default_name.to_string());
        let email = std::env::var(format!("GIT_{prefix}_EMAIL")).unwrap_or_else(|_| default_email.to_string());
        Self::new(name, email, now, 0)
    }
}

/// A commit proposal accepted by [`crate::Repository::commit`]: the message
/// plus an optional explicit author/committer (falling back to the
/// environment when absent).
#[derive(Clone, Debug)]
pub struct CommitProposal {
    pub message: String,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
}

impl CommitProposal {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: None,
            committer: None,
        }
    }

    pub fn with_author(mut self, author: Signature) -> Self {
        self.author = Some(author);
        self
    }

    pub fn with_committer(mut self, committer: Signature) -> Self {
        self.committer = Some(committer);
        self
    }
}

/// Result of a successful [`crate::Repository::commit`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitResult {
    pub commit_id: kart_store::ObjectId,
    pub tree_id: kart_store::ObjectId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_builder_carries_explicit_signatures() {
        let author = Signature::new("Alice", "alice@example.com", 1000, 60);
        let p = CommitProposal::new("add roads").with_author(author.clone());
        assert_eq!(p.message, "add roads");
        assert_eq!(p.author, Some(author));
        assert!(p.committer.is_none());
    }

    #[test]
    fn from_env_or_falls_back_when_unset() {
        std::env::remove_var("GIT_AUTHOR_NAME");
        std::env::remove_var("GIT_AUTHOR_EMAIL");
        let sig = Signature::from_env_or("AUTHOR", "Kart", "kart@example.com", 42);
        assert_eq!(sig.name, "Kart");
        assert_eq!(sig.email, "kart@example.com");
        assert_eq!(sig.time, 42);
    }
}
