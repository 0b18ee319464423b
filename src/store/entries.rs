// Impass — In-memory entry operations
//
// add / replace / remove / update / search over the decoded collection.
// Nothing here touches the disk. Every check runs before the collection is
// modified, so a failed call leaves it exactly as it was.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use zeroize::Zeroizing;

use super::codec::Collection;
use super::models::{Record, SecretSpec, MAX_SECRET_BYTES};
use super::DatabaseError;

/// Random secret from `byte_len` CSPRNG bytes, URL-safe base64 without
/// padding or line breaks.
pub fn generate_secret(byte_len: usize) -> Zeroizing<String> {
    let mut raw = Zeroizing::new(vec![0u8; byte_len]);
    rand::rng().fill_bytes(&mut raw);
    Zeroizing::new(URL_SAFE_NO_PAD.encode(&*raw))
}

fn resolve(spec: SecretSpec) -> Result<Zeroizing<String>, DatabaseError> {
    match spec {
        SecretSpec::Generate(byte_len) if byte_len > MAX_SECRET_BYTES => {
            Err(DatabaseError::SecretTooLong(byte_len))
        }
        SecretSpec::Generate(byte_len) => Ok(generate_secret(byte_len)),
        SecretSpec::Literal(secret) => Ok(secret),
        SecretSpec::PromptInteractively => Err(DatabaseError::UnresolvedSecret),
    }
}

/// The record collection plus the rules that keep it consistent:
/// no empty context, no duplicate context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entries {
    records: Collection,
}

impl Entries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collection(records: Collection) -> Self {
        Self { records }
    }

    pub fn as_collection(&self) -> &Collection {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.records.contains_key(context)
    }

    /// All contexts, in sorted order.
    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Point lookup; no partial matching.
    pub fn lookup_exact(&self, context: &str) -> Option<&Record> {
        self.records.get(context)
    }

    pub fn add(&mut self, context: &str, spec: SecretSpec) -> Result<&Record, DatabaseError> {
        if context.is_empty() {
            return Err(DatabaseError::EmptyContext);
        }
        if self.contains(context) {
            return Err(DatabaseError::DuplicateContext(context.to_string()));
        }
        let record = Record::new(resolve(spec)?);
        Ok(self.records.entry(context.to_string()).or_insert(record))
    }

    /// New secret and timestamp for an existing context.
    pub fn replace(&mut self, context: &str, spec: SecretSpec) -> Result<&Record, DatabaseError> {
        if !self.contains(context) {
            return Err(DatabaseError::ContextNotFound(context.to_string()));
        }
        let secret = resolve(spec)?;
        let slot = self
            .records
            .get_mut(context)
            .ok_or_else(|| DatabaseError::ContextNotFound(context.to_string()))?;
        *slot = Record::new(secret);
        Ok(slot)
    }

    pub fn remove(&mut self, context: &str) -> Result<Record, DatabaseError> {
        self.records
            .remove(context)
            .ok_or_else(|| DatabaseError::ContextNotFound(context.to_string()))
    }

    /// Rename `old` to `new`, keeping the secret and its timestamp verbatim.
    /// `new == old` counts as a duplicate.
    pub fn update(&mut self, old: &str, new: &str) -> Result<&Record, DatabaseError> {
        if !self.contains(old) {
            return Err(DatabaseError::ContextNotFound(old.to_string()));
        }
        if new.is_empty() {
            return Err(DatabaseError::EmptyContext);
        }
        if self.contains(new) {
            return Err(DatabaseError::DuplicateContext(new.to_string()));
        }
        let record = self
            .records
            .remove(old)
            .ok_or_else(|| DatabaseError::ContextNotFound(old.to_string()))?;
        Ok(self.records.entry(new.to_string()).or_insert(record))
    }

    /// Every record whose context contains `query` (case-sensitive).
    /// `None` returns the whole collection.
    pub fn search(&self, query: Option<&str>) -> BTreeMap<&str, &Record> {
        self.records
            .iter()
            .filter(|(context, _)| query.map_or(true, |q| context.contains(q)))
            .map(|(context, record)| (context.as_str(), record))
            .collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_with(contexts: &[&str]) -> Entries {
        let mut e = Entries::new();
        for ctx in contexts {
            e.add(ctx, SecretSpec::literal(format!("secret-{}", ctx))).unwrap();
        }
        e
    }

    #[test]
    fn test_generated_secret_has_requested_entropy() {
        let secret = generate_secret(18);
        let decoded = URL_SAFE_NO_PAD.decode(secret.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 18, "Generated secret must carry exactly 18 random bytes");
        assert!(!secret.contains('='), "No padding");
        assert!(!secret.contains('\n'), "No line breaks");
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(generate_secret(18).as_str(), generate_secret(18).as_str());
    }

    #[test]
    fn test_add_generates_secret_of_given_length() {
        let mut e = Entries::new();
        let rec = e.add("example.com", SecretSpec::Generate(12)).unwrap();
        assert_eq!(URL_SAFE_NO_PAD.decode(rec.secret()).unwrap().len(), 12);
    }

    #[test]
    fn test_add_literal_secret() {
        let mut e = Entries::new();
        e.add("mail", SecretSpec::literal("hunter2")).unwrap();
        assert_eq!(e.lookup_exact("mail").unwrap().secret(), "hunter2");
    }

    #[test]
    fn test_add_duplicate_fails() {
        let mut e = entries_with(&["github"]);
        let err = e.add("github", SecretSpec::Generate(8)).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateContext(ref c) if c == "github"));
        assert_eq!(e.lookup_exact("github").unwrap().secret(), "secret-github");
    }

    #[test]
    fn test_add_empty_context_leaves_collection_unchanged() {
        let mut e = entries_with(&["a"]);
        let before = e.clone();
        let err = e.add("", SecretSpec::literal("x")).unwrap_err();
        assert!(matches!(err, DatabaseError::EmptyContext));
        assert_eq!(e, before);
    }

    #[test]
    fn test_unresolved_prompt_is_rejected() {
        let mut e = Entries::new();
        let err = e.add("x", SecretSpec::PromptInteractively).unwrap_err();
        assert!(matches!(err, DatabaseError::UnresolvedSecret));
        assert!(e.is_empty());
    }

    #[test]
    fn test_oversized_generate_is_refused_before_allocating() {
        let mut e = entries_with(&["bank"]);
        let before = e.clone();

        let err = e.add("x", SecretSpec::Generate(usize::MAX)).unwrap_err();
        assert!(matches!(err, DatabaseError::SecretTooLong(usize::MAX)), "got {:?}", err);

        let err = e
            .replace("bank", SecretSpec::Generate(MAX_SECRET_BYTES + 1))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::SecretTooLong(_)));
        assert_eq!(e, before, "Refused requests must not touch the collection");

        let rec = e.add("y", SecretSpec::Generate(MAX_SECRET_BYTES)).unwrap();
        assert_eq!(URL_SAFE_NO_PAD.decode(rec.secret()).unwrap().len(), MAX_SECRET_BYTES);
    }

    #[test]
    fn test_whitespace_padded_context_is_ordinary() {
        let e = entries_with(&[" padded ", "plain"]);
        assert!(e.contains(" padded "));
        assert!(!e.contains("padded"));
        assert_eq!(e.search(Some("padded")).len(), 1);
        assert_eq!(e.search(None).len(), 2);
    }

    #[test]
    fn test_missing_context_operations_fail() {
        let mut e = entries_with(&["present"]);
        assert!(matches!(
            e.replace("absent", SecretSpec::Generate(8)),
            Err(DatabaseError::ContextNotFound(_))
        ));
        assert!(matches!(e.remove("absent"), Err(DatabaseError::ContextNotFound(_))));
        assert!(matches!(
            e.update("absent", "other"),
            Err(DatabaseError::ContextNotFound(_))
        ));
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn test_replace_changes_secret_and_timestamp() {
        let mut e = Entries::new();
        let old_ts = crate::store::models::iso8601::parse("2000-01-01T00:00:00Z").unwrap();
        e.records.insert(
            "bank".to_string(),
            Record::with_timestamp(Zeroizing::new("old".to_string()), old_ts),
        );

        let rec = e.replace("bank", SecretSpec::literal("new")).unwrap();
        assert_eq!(rec.secret(), "new");
        assert!(rec.created_at() > old_ts, "Replace must restamp the record");
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn test_remove_deletes_record() {
        let mut e = entries_with(&["a", "b"]);
        let removed = e.remove("a").unwrap();
        assert_eq!(removed.secret(), "secret-a");
        assert!(!e.contains("a"));
        assert_eq!(e.contexts().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_update_preserves_secret_and_timestamp() {
        let mut e = entries_with(&["old.example"]);
        let before = e.lookup_exact("old.example").unwrap().clone();

        e.update("old.example", "new.example").unwrap();

        let after = e.lookup_exact("new.example").unwrap();
        assert_eq!(after.secret(), before.secret());
        assert_eq!(after.created_at(), before.created_at());
        assert!(!e.contains("old.example"));
    }

    #[test]
    fn test_update_onto_existing_or_itself_is_duplicate() {
        let mut e = entries_with(&["a", "b"]);
        let before = e.clone();

        assert!(matches!(e.update("a", "b"), Err(DatabaseError::DuplicateContext(_))));
        assert!(matches!(e.update("a", "a"), Err(DatabaseError::DuplicateContext(_))));
        assert!(matches!(e.update("a", ""), Err(DatabaseError::EmptyContext)));
        assert_eq!(e, before);
    }

    #[test]
    fn test_search_substring() {
        let e = entries_with(&["alpha", "beta", "alphabet"]);

        let hits: Vec<&str> = e.search(Some("alpha")).into_keys().collect();
        assert_eq!(hits, vec!["alpha", "alphabet"]);

        assert_eq!(e.search(None).len(), 3);
        assert!(e.search(Some("zzz")).is_empty());
    }

    #[test]
    fn test_search_is_case_sensitive() {
        let e = entries_with(&["GitHub"]);
        assert!(e.search(Some("github")).is_empty());
        assert_eq!(e.search(Some("Hub")).len(), 1);
    }
}
