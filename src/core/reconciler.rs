//! Repairs drift between the biometric index and the record store.
//!
//! Every `CustomerId` in the store should name a face in the index and every
//! face in the index should have a record. The two stores are written
//! independently, so either side can end up orphaned:
//!
//! - a face matched at the door but has no record: [`Reconciler::repair_orphaned_match`]
//!   rebuilds the record from attributes supplied by an operator;
//! - faces with no record at all: [`Reconciler::cleanup_orphaned_faces`] sweeps
//!   them out of the index;
//! - records whose face is gone are only reported, by [`Reconciler::audit`].
//!
//! Both repairs are idempotent and safe to re-run after a partial failure.

use crate::common::{FaceLinkError, Result};
use crate::index::{BiometricIndex, FaceId};
use crate::storage::{CustomerId, CustomerRecord, RecordStore};

/// Identity details supplied from outside the two stores.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityAttributes {
    pub name: String,
    pub member_id: Option<String>,
}

impl IdentityAttributes {
    /// Trims both fields; a blank member id becomes `None`.
    pub fn new(name: impl Into<String>, member_id: Option<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            member_id: member_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Repaired(CustomerRecord),
    /// A record already existed; nothing was written.
    AlreadyLinked(CustomerRecord),
    /// The face is no longer in the index; nothing was written.
    TemplateMissing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub removed: Vec<FaceId>,
}

impl CleanupReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    /// Faces in the index with no customer record.
    pub orphaned_faces: Vec<FaceId>,
    /// Customer records whose face is not in the index.
    pub dangling_records: Vec<CustomerId>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_faces.is_empty() && self.dangling_records.is_empty()
    }
}

pub struct Reconciler<'a> {
    index: &'a dyn BiometricIndex,
    store: &'a dyn RecordStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a dyn BiometricIndex, store: &'a dyn RecordStore) -> Self {
        Self { index, store }
    }

    /// Recreates the customer record for a face the index still holds.
    ///
    /// The record gets a placeholder image key since the enrollment image is
    /// not recoverable. A failed write leaves both stores as they were.
    pub fn repair_orphaned_match(
        &self,
        face_id: &str,
        attributes: &IdentityAttributes,
    ) -> Result<RepairOutcome> {
        if attributes.name.is_empty() {
            return Err(FaceLinkError::ReconciliationFailure {
                face_id: face_id.to_string(),
                reason: "customer name is required".to_string(),
            });
        }

        if self.index.fetch(face_id)?.is_none() {
            tracing::warn!("Face {} is no longer in the index; not repairing", face_id);
            return Ok(RepairOutcome::TemplateMissing);
        }

        if let Some(existing) = self.store.get(face_id)? {
            tracing::info!("Face {} is already linked to {}", face_id, existing.name);
            return Ok(RepairOutcome::AlreadyLinked(existing));
        }

        let record = CustomerRecord::new(
            face_id,
            attributes.name.clone(),
            CustomerRecord::recovered_image_key(face_id),
            attributes.member_id.clone(),
        );

        self.store
            .put(&record)
            .map_err(|e| FaceLinkError::ReconciliationFailure {
                face_id: face_id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!("Recreated customer record for {} ({})", record.name, face_id);
        Ok(RepairOutcome::Repaired(record))
    }

    /// Faces in the index with no record, without touching anything.
    pub fn find_orphaned_faces(&self) -> Result<Vec<FaceId>> {
        let mut orphans = Vec::new();
        for face_id in self.index.list_all()? {
            if !self.store.exists(&face_id)? {
                orphans.push(face_id);
            }
        }
        Ok(orphans)
    }

    /// Deletes every indexed face that has no customer record.
    ///
    /// Assumes no enrollment runs against the same collection meanwhile: a face
    /// enrolled after the listing whose record is not yet written would be
    /// swept. The sweep is not transactional; if it stops part-way, running it
    /// again only touches faces that are still orphaned. A store error aborts
    /// the sweep rather than being read as "no record".
    pub fn cleanup_orphaned_faces(&self) -> Result<CleanupReport> {
        let face_ids = self.index.list_all()?;
        let mut report = CleanupReport {
            scanned: face_ids.len(),
            removed: Vec::new(),
        };

        for face_id in face_ids {
            if self.store.exists(&face_id)? {
                continue;
            }
            self.index.delete(&face_id)?;
            tracing::info!("Removed orphaned face: {}", face_id);
            report.removed.push(face_id);
        }

        tracing::info!(
            "Cleanup complete. Removed {} of {} faces.",
            report.removed_count(),
            report.scanned
        );
        Ok(report)
    }

    /// Reports violations in both directions without repairing anything.
    pub fn audit(&self) -> Result<AuditReport> {
        let face_ids = self.index.list_all()?;
        let mut record_ids = self.store.keys()?;
        record_ids.sort();

        let orphaned_faces = face_ids
            .iter()
            .filter(|id| record_ids.binary_search(id).is_err())
            .cloned()
            .collect();

        let mut sorted_faces = face_ids;
        sorted_faces.sort();
        let dangling_records = record_ids
            .iter()
            .filter(|id| sorted_faces.binary_search(id).is_err())
            .cloned()
            .collect();

        Ok(AuditReport {
            orphaned_faces,
            dangling_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::{IdentityResolver, Resolution};
    use crate::testing::{tagged_image, FakeIndex, MemoryStore};

    fn jane() -> IdentityAttributes {
        IdentityAttributes::new("Jane", None)
    }

    #[test]
    fn attributes_are_trimmed_and_blank_member_ids_dropped() {
        let attrs = IdentityAttributes::new("  Jane ", Some("   ".into()));
        assert_eq!(attrs.name, "Jane");
        assert_eq!(attrs.member_id, None);

        let attrs = IdentityAttributes::new("Jane", Some(" m-9 ".into()));
        assert_eq!(attrs.member_id.as_deref(), Some("m-9"));
    }

    #[test]
    fn orphaned_match_is_identified_after_repair() {
        let index = FakeIndex::new();
        index.insert("f1", 7, 92.0);
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new(&index, &store, 80.0);
        let probe = tagged_image(7, 4, 4);

        assert_eq!(
            resolver.resolve(&probe).unwrap(),
            Resolution::OrphanedMatch { face_id: "f1".into(), similarity: 92.0 }
        );

        let reconciler = Reconciler::new(&index, &store);
        let outcome = reconciler.repair_orphaned_match("f1", &jane()).unwrap();
        assert!(matches!(outcome, RepairOutcome::Repaired(ref r) if r.customer_id == "f1"));

        match resolver.resolve(&probe).unwrap() {
            Resolution::Identified { record, .. } => {
                assert_eq!(record.customer_id, "f1");
                assert_eq!(record.name, "Jane");
                assert_eq!(record.image_key, "recovered_faces/f1.jpg");
            }
            other => panic!("expected Identified, got {:?}", other),
        }
    }

    #[test]
    fn repairing_twice_keeps_one_record() {
        let index = FakeIndex::new();
        index.insert("f1", 7, 92.0);
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&index, &store);

        let first = match reconciler.repair_orphaned_match("f1", &jane()).unwrap() {
            RepairOutcome::Repaired(record) => record,
            other => panic!("expected Repaired, got {:?}", other),
        };
        let second = reconciler.repair_orphaned_match("f1", &jane()).unwrap();

        assert_eq!(second, RepairOutcome::AlreadyLinked(first.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("f1").unwrap(), Some(first));
        assert_eq!(store.put_count(), 1);
    }

    #[test]
    fn repair_of_missing_template_writes_nothing() {
        let index = FakeIndex::new();
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&index, &store);

        assert_eq!(
            reconciler.repair_orphaned_match("gone", &jane()).unwrap(),
            RepairOutcome::TemplateMissing
        );
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn failed_write_is_a_reconciliation_failure_with_no_partial_state() {
        let index = FakeIndex::new();
        index.insert("f1", 7, 92.0);
        let store = MemoryStore::new();
        store.fail_puts(true);
        let reconciler = Reconciler::new(&index, &store);

        let err = reconciler.repair_orphaned_match("f1", &jane()).unwrap_err();
        assert!(matches!(err, FaceLinkError::ReconciliationFailure { ref face_id, .. } if face_id == "f1"));
        assert_eq!(store.len(), 0);
        assert_eq!(index.face_ids(), vec!["f1".to_string()]);
    }

    #[test]
    fn blank_name_is_refused() {
        let index = FakeIndex::new();
        index.insert("f1", 7, 92.0);
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&index, &store);

        assert!(reconciler
            .repair_orphaned_match("f1", &IdentityAttributes::new("  ", None))
            .is_err());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn cleanup_deletes_exactly_the_orphans() {
        let index = FakeIndex::new();
        for (id, tag) in [("f1", 1), ("f2", 2), ("f3", 3)] {
            index.insert(id, tag, 95.0);
        }
        let store = MemoryStore::new();
        store.insert(CustomerRecord::new("f1", "Ann", "faces/f1.jpg", None));
        store.insert(CustomerRecord::new("f3", "Cy", "faces/f3.jpg", None));
        let reconciler = Reconciler::new(&index, &store);

        let report = reconciler.cleanup_orphaned_faces().unwrap();
        assert_eq!(report.removed, vec!["f2".to_string()]);
        assert_eq!(report.removed_count(), 1);
        assert_eq!(report.scanned, 3);
        assert_eq!(index.face_ids(), vec!["f1".to_string(), "f3".to_string()]);

        let again = reconciler.cleanup_orphaned_faces().unwrap();
        assert_eq!(again.removed_count(), 0);
    }

    #[test]
    fn cleanup_walks_every_page() {
        // FakeIndex pages two ids at a time
        let index = FakeIndex::new();
        let store = MemoryStore::new();
        for n in 0..7u8 {
            let id = format!("f{}", n);
            index.insert(&id, n + 1, 95.0);
            if n % 2 == 0 {
                store.insert(CustomerRecord::new(id, "x", "k", None));
            }
        }

        let report = Reconciler::new(&index, &store).cleanup_orphaned_faces().unwrap();
        assert_eq!(report.scanned, 7);
        assert_eq!(report.removed, vec!["f1", "f3", "f5"]);
    }

    #[test]
    fn cleanup_aborts_when_store_is_unavailable() {
        let index = FakeIndex::new();
        index.insert("f1", 1, 95.0);
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let err = Reconciler::new(&index, &store)
            .cleanup_orphaned_faces()
            .unwrap_err();
        assert!(matches!(err, FaceLinkError::StoreUnavailable(_)));
        assert_eq!(index.face_ids(), vec!["f1".to_string()]);
    }

    #[test]
    fn audit_reports_both_directions() {
        let index = FakeIndex::new();
        index.insert("f1", 1, 95.0);
        index.insert("f2", 2, 95.0);
        let store = MemoryStore::new();
        store.insert(CustomerRecord::new("f1", "Ann", "k", None));
        store.insert(CustomerRecord::new("f9", "Zed", "k", None));

        let report = Reconciler::new(&index, &store).audit().unwrap();
        assert_eq!(report.orphaned_faces, vec!["f2"]);
        assert_eq!(report.dangling_records, vec!["f9"]);
        assert!(!report.is_consistent());
        assert_eq!(index.face_ids().len(), 2);
    }

    #[test]
    fn find_orphans_does_not_delete() {
        let index = FakeIndex::new();
        index.insert("f1", 1, 95.0);
        let store = MemoryStore::new();

        let reconciler = Reconciler::new(&index, &store);
        assert_eq!(reconciler.find_orphaned_faces().unwrap(), vec!["f1"]);
        assert_eq!(index.face_ids(), vec!["f1".to_string()]);
    }
}
