use crate::common::{FaceLinkError, Result};
use crate::core::recognizer::similarity_percent;
use crate::index::{BiometricIndex, FaceEmbedder, FaceId, FacePage, FaceTemplate, MatchResult};
use crate::storage::{validate_key, write_atomic};
use chrono::Utc;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const TEMPLATE_VERSION: u32 = 1;
const TEMPLATE_EXT: &str = "bincode";

#[derive(Serialize, Deserialize)]
struct StoredTemplate {
    version: u32,
    template: FaceTemplate,
}

/// File-backed index: one template per file under `<root>/collections/<collection_id>/`.
pub struct LocalFaceIndex<E> {
    dir: PathBuf,
    embedder: E,
}

fn unavailable(context: &str, path: &Path, e: std::io::Error) -> FaceLinkError {
    FaceLinkError::IndexUnavailable(format!("{} {}: {}", context, path.display(), e))
}

impl<E: FaceEmbedder> LocalFaceIndex<E> {
    pub fn open(data_root: &Path, collection_id: &str, embedder: E) -> Result<Self> {
        validate_key(collection_id)?;
        let dir = data_root.join("collections").join(collection_id);
        fs::create_dir_all(&dir).map_err(|e| unavailable("creating collection", &dir, e))?;

        tracing::debug!("Biometric index collection at {:?}", dir);
        Ok(Self { dir, embedder })
    }

    fn template_path(&self, face_id: &str) -> Result<PathBuf> {
        validate_key(face_id)?;
        Ok(self.dir.join(format!("{}.{}", face_id, TEMPLATE_EXT)))
    }

    /// Sorted ids of every stored template.
    fn face_ids(&self) -> Result<Vec<FaceId>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| unavailable("listing", &self.dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| unavailable("listing", &self.dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXT) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) if validate_key(stem).is_ok() => ids.push(stem.to_string()),
                _ => tracing::warn!("Ignoring stray file in collection: {:?}", path),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read_template(&self, path: &Path) -> Result<Option<FaceTemplate>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable("reading", path, e)),
        };

        let stored: StoredTemplate = bincode::deserialize(&data).map_err(|e| {
            FaceLinkError::Storage(format!("Corrupt template {}: {}", path.display(), e))
        })?;
        if stored.version > TEMPLATE_VERSION {
            return Err(FaceLinkError::Storage(format!(
                "Template {} has unsupported version {}",
                path.display(),
                stored.version
            )));
        }
        Ok(Some(stored.template))
    }
}

impl<E: FaceEmbedder> BiometricIndex for LocalFaceIndex<E> {
    fn search(&self, image: &DynamicImage, threshold: f32) -> Result<Option<MatchResult>> {
        let probe = self
            .embedder
            .embed(image)?
            .ok_or_else(|| FaceLinkError::Index("No face detected in probe image".into()))?;

        let mut best: Option<MatchResult> = None;
        for face_id in self.face_ids()? {
            let path = self.template_path(&face_id)?;
            let template = match self.read_template(&path) {
                Ok(Some(template)) => template,
                Ok(None) => continue,
                Err(FaceLinkError::Storage(msg)) => {
                    tracing::warn!("Skipping unreadable template: {}", msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let similarity = similarity_percent(&probe.embedding, &template.embedding);
            if best.as_ref().map_or(true, |b| similarity > b.similarity) {
                best = Some(MatchResult { face_id, similarity });
            }
        }

        match best {
            Some(candidate) if candidate.similarity >= threshold => {
                tracing::debug!(
                    "Best match {} at {:.2}%",
                    candidate.face_id,
                    candidate.similarity
                );
                Ok(Some(candidate))
            }
            Some(candidate) => {
                tracing::debug!(
                    "Best candidate {} at {:.2}% is below threshold {:.2}%",
                    candidate.face_id,
                    candidate.similarity,
                    threshold
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn enroll(&self, image: &DynamicImage) -> Result<FaceId> {
        let sample = self
            .embedder
            .embed(image)?
            .ok_or_else(|| FaceLinkError::Index("No usable face in enrollment image".into()))?;

        let face_id = Uuid::new_v4().to_string();
        let stored = StoredTemplate {
            version: TEMPLATE_VERSION,
            template: FaceTemplate {
                face_id: face_id.clone(),
                embedding: sample.embedding,
                bounding_box: sample.face,
                indexed_at: Utc::now(),
            },
        };

        let encoded = bincode::serialize(&stored)
            .map_err(|e| FaceLinkError::Storage(format!("Failed to serialize template: {}", e)))?;
        let path = self.template_path(&face_id)?;
        write_atomic(&path, &encoded).map_err(|e| unavailable("writing", &path, e))?;

        tracing::info!("Indexed face {}", face_id);
        Ok(face_id)
    }

    fn fetch(&self, face_id: &str) -> Result<Option<FaceTemplate>> {
        let path = self.template_path(face_id)?;
        self.read_template(&path)
    }

    fn list_page(&self, cursor: Option<&str>, limit: usize) -> Result<FacePage> {
        let limit = limit.max(1);
        let mut remaining = self
            .face_ids()?
            .into_iter()
            .filter(|id| cursor.map_or(true, |c| id.as_str() > c))
            .peekable();

        let face_ids: Vec<FaceId> = remaining.by_ref().take(limit).collect();
        let next_cursor = match remaining.peek() {
            Some(_) => face_ids.last().cloned(),
            None => None,
        };

        Ok(FacePage { face_ids, next_cursor })
    }

    fn delete(&self, face_id: &str) -> Result<()> {
        let path = self.template_path(face_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted face {} from index", face_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable("deleting", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tagged_image, TagEmbedder};

    fn open(dir: &Path) -> LocalFaceIndex<TagEmbedder> {
        LocalFaceIndex::open(dir, "test-collection", TagEmbedder).unwrap()
    }

    #[test]
    fn enroll_then_search_finds_same_face() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());

        let alice = index.enroll(&tagged_image(10, 8, 8)).unwrap();
        let _bob = index.enroll(&tagged_image(200, 8, 8)).unwrap();

        let hit = index.search(&tagged_image(10, 8, 8), 80.0).unwrap().unwrap();
        assert_eq!(hit.face_id, alice);
        assert!(hit.similarity > 99.0);

        let template = index.fetch(&alice).unwrap().unwrap();
        assert_eq!(template.face_id, alice);
    }

    #[test]
    fn faceless_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());

        assert!(matches!(
            index.enroll(&tagged_image(0, 8, 8)),
            Err(FaceLinkError::Index(_))
        ));
        assert!(matches!(
            index.search(&tagged_image(0, 8, 8), 80.0),
            Err(FaceLinkError::Index(_))
        ));
    }

    #[test]
    fn search_below_threshold_is_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());
        index.enroll(&tagged_image(10, 8, 8)).unwrap();

        assert!(index.search(&tagged_image(200, 8, 8), 80.0).unwrap().is_none());
        assert!(index.search(&tagged_image(10, 8, 8), 100.1).unwrap().is_none());
    }

    #[test]
    fn pages_cover_every_face_once() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());
        let mut enrolled: Vec<FaceId> = (1..=5)
            .map(|tag| index.enroll(&tagged_image(tag * 40, 8, 8)).unwrap())
            .collect();
        enrolled.sort();

        let first = index.list_page(None, 2).unwrap();
        assert_eq!(first.face_ids, enrolled[..2].to_vec());
        let second = index.list_page(first.next_cursor.as_deref(), 2).unwrap();
        assert_eq!(second.face_ids, enrolled[2..4].to_vec());
        let last = index.list_page(second.next_cursor.as_deref(), 2).unwrap();
        assert_eq!(last.face_ids, enrolled[4..].to_vec());
        assert_eq!(last.next_cursor, None);

        assert_eq!(index.list_all().unwrap(), enrolled);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());
        let face_id = index.enroll(&tagged_image(10, 8, 8)).unwrap();

        index.delete(&face_id).unwrap();
        index.delete(&face_id).unwrap();
        assert!(index.fetch(&face_id).unwrap().is_none());
        assert!(index.list_all().unwrap().is_empty());
    }

    #[test]
    fn stray_files_do_not_break_listing_or_search() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());
        let face_id = index.enroll(&tagged_image(10, 8, 8)).unwrap();
        fs::write(
            dir.path().join("collections/test-collection/a.b.bincode"),
            b"leftover",
        )
        .unwrap();

        assert_eq!(index.list_all().unwrap(), vec![face_id.clone()]);
        let hit = index.search(&tagged_image(10, 8, 8), 80.0).unwrap().unwrap();
        assert_eq!(hit.face_id, face_id);
    }

    #[test]
    fn path_like_ids_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(dir.path());
        assert!(matches!(
            index.fetch("../escape"),
            Err(FaceLinkError::InvalidKey(_))
        ));
    }
}
