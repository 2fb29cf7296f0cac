//! In-memory doubles shared by the unit tests.
//!
//! Images are identified by a "tag": the luma value of their top-left pixel.
//! Tag 0 stands for an image with no face in it.

use crate::common::{FaceLinkError, Result};
use crate::core::detector::{FaceBox, FaceLocator};
use crate::index::{
    BiometricIndex, FaceEmbedder, FaceId, FacePage, FaceSample, FaceTemplate, MatchResult,
};
use crate::storage::{BlobStore, CustomerId, CustomerRecord, RecordStore};
use chrono::Utc;
use image::{DynamicImage, GrayImage, Luma};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

pub fn tagged_image(tag: u8, width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([tag])))
}

pub fn tag_of(image: &DynamicImage) -> u8 {
    image.to_luma8().get_pixel(0, 0)[0]
}

/// Embeds a tag as a unit vector; distinct tags point in distinct directions.
pub struct TagEmbedder;

impl FaceEmbedder for TagEmbedder {
    fn embed(&self, image: &DynamicImage) -> Result<Option<FaceSample>> {
        let tag = tag_of(image);
        if tag == 0 {
            return Ok(None);
        }
        let angle = tag as f32 / 255.0 * std::f32::consts::FRAC_PI_2;
        Ok(Some(FaceSample {
            embedding: vec![angle.cos(), angle.sin()],
            face: FaceBox::new(0.0, 0.0, image.width() as f32, image.height() as f32, 0.99),
        }))
    }
}

type LocateFn = Box<dyn Fn(&DynamicImage) -> Result<Vec<FaceBox>>>;

pub struct FnLocator {
    locate: LocateFn,
}

impl FnLocator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&DynamicImage) -> Vec<FaceBox> + 'static,
    {
        Self {
            locate: Box::new(move |image| Ok(f(image))),
        }
    }

    /// Returns `faces` for every frame except those tagged `tag`, which error.
    pub fn failing_on_tag(tag: u8, faces: Vec<FaceBox>) -> Self {
        Self {
            locate: Box::new(move |image| {
                if tag_of(image) == tag {
                    Err(FaceLinkError::Model("inference failed".into()))
                } else {
                    Ok(faces.clone())
                }
            }),
        }
    }
}

impl FaceLocator for FnLocator {
    fn locate(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        (self.locate)(image)
    }
}

struct FakeFace {
    tag: u8,
    similarity: f32,
}

/// Index where a probe matches the face enrolled with the same tag, at a
/// fixed similarity. Lists two ids per page.
pub struct FakeIndex {
    faces: RefCell<BTreeMap<FaceId, FakeFace>>,
    unavailable: Cell<bool>,
    lenient: bool,
    next_id: Cell<u32>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self {
            faces: RefCell::new(BTreeMap::new()),
            unavailable: Cell::new(false),
            lenient: false,
            next_id: Cell::new(1),
        }
    }

    /// Returns candidates even below the requested threshold.
    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }

    pub fn insert(&self, face_id: &str, tag: u8, similarity: f32) {
        self.faces
            .borrow_mut()
            .insert(face_id.to_string(), FakeFace { tag, similarity });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    pub fn face_ids(&self) -> Vec<FaceId> {
        self.faces.borrow().keys().cloned().collect()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.get() {
            Err(FaceLinkError::IndexUnavailable("index offline".into()))
        } else {
            Ok(())
        }
    }
}

impl BiometricIndex for FakeIndex {
    fn search(&self, image: &DynamicImage, threshold: f32) -> Result<Option<MatchResult>> {
        self.check()?;
        let tag = tag_of(image);
        if tag == 0 {
            return Err(FaceLinkError::Index("no face in probe".into()));
        }

        let faces = self.faces.borrow();
        let hit = faces
            .iter()
            .find(|(_, face)| face.tag == tag)
            .filter(|(_, face)| self.lenient || face.similarity >= threshold)
            .map(|(id, face)| MatchResult {
                face_id: id.clone(),
                similarity: face.similarity,
            });
        Ok(hit)
    }

    fn enroll(&self, image: &DynamicImage) -> Result<FaceId> {
        self.check()?;
        let tag = tag_of(image);
        if tag == 0 {
            return Err(FaceLinkError::Index("no usable face".into()));
        }
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        let face_id = format!("enrolled-{}", n);
        self.insert(&face_id, tag, 99.0);
        Ok(face_id)
    }

    fn fetch(&self, face_id: &str) -> Result<Option<FaceTemplate>> {
        self.check()?;
        Ok(self.faces.borrow().get(face_id).map(|face| FaceTemplate {
            face_id: face_id.to_string(),
            embedding: vec![face.tag as f32],
            bounding_box: FaceBox::new(0.0, 0.0, 1.0, 1.0, 1.0),
            indexed_at: Utc::now(),
        }))
    }

    fn list_page(&self, cursor: Option<&str>, limit: usize) -> Result<FacePage> {
        self.check()?;
        let limit = limit.clamp(1, 2);
        let faces = self.faces.borrow();
        let mut remaining = faces
            .keys()
            .filter(|id| cursor.map_or(true, |c| id.as_str() > c))
            .cloned()
            .peekable();

        let face_ids: Vec<FaceId> = remaining.by_ref().take(limit).collect();
        let next_cursor = remaining.peek().and(face_ids.last().cloned());
        Ok(FacePage { face_ids, next_cursor })
    }

    fn delete(&self, face_id: &str) -> Result<()> {
        self.check()?;
        self.faces.borrow_mut().remove(face_id);
        Ok(())
    }
}

/// Record store with failure injection.
pub struct MemoryStore {
    records: RefCell<BTreeMap<CustomerId, CustomerRecord>>,
    unavailable: Cell<bool>,
    fail_puts: Cell<bool>,
    puts: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RefCell::new(BTreeMap::new()),
            unavailable: Cell::new(false),
            fail_puts: Cell::new(false),
            puts: Cell::new(0),
        }
    }

    /// Seeds a record without counting it as a `put`.
    pub fn insert(&self, record: CustomerRecord) {
        self.records
            .borrow_mut()
            .insert(record.customer_id.clone(), record);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.set(fail);
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn put_count(&self) -> usize {
        self.puts.get()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.get() {
            Err(FaceLinkError::StoreUnavailable("store offline".into()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, customer_id: &str) -> Result<Option<CustomerRecord>> {
        self.check()?;
        Ok(self.records.borrow().get(customer_id).cloned())
    }

    fn put(&self, record: &CustomerRecord) -> Result<()> {
        self.check()?;
        if self.fail_puts.get() {
            return Err(FaceLinkError::StoreUnavailable("write rejected".into()));
        }
        self.puts.set(self.puts.get() + 1);
        self.insert(record.clone());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<CustomerId>> {
        self.check()?;
        Ok(self.records.borrow().keys().cloned().collect())
    }
}

/// Blob store that keeps objects in memory, or refuses every write.
pub struct MemoryBlobs {
    objects: RefCell<BTreeMap<String, Vec<u8>>>,
    broken: bool,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self {
            objects: RefCell::new(BTreeMap::new()),
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobs {
    fn put_object(&self, bytes: &[u8], key: &str) -> Result<()> {
        if self.broken {
            return Err(FaceLinkError::Blob("bucket unreachable".into()));
        }
        self.objects
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
