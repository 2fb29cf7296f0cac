use crate::common::Result;
use crate::core::reconciler::IdentityAttributes;
use crate::core::resolver::{IdentityResolver, Resolution};
use crate::index::{BiometricIndex, FaceId};
use crate::storage::{BlobStore, CustomerRecord, RecordStore};
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentReceipt {
    pub record: CustomerRecord,
    /// False when the source image could not be uploaded; the customer is
    /// still enrolled.
    pub image_stored: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollOutcome {
    Enrolled(EnrollmentReceipt),
    AlreadyEnrolled(CustomerRecord),
    /// The face is already indexed but has no record; repair it instead.
    OrphanedMatch(FaceId),
}

/// Registers new customers: one template in the index, one record in the
/// store, and the source image in the blob store.
pub struct Enrollment<'a> {
    index: &'a dyn BiometricIndex,
    store: &'a dyn RecordStore,
    blobs: &'a dyn BlobStore,
    threshold: f32,
}

impl<'a> Enrollment<'a> {
    pub fn new(
        index: &'a dyn BiometricIndex,
        store: &'a dyn RecordStore,
        blobs: &'a dyn BlobStore,
        threshold: f32,
    ) -> Self {
        Self {
            index,
            store,
            blobs,
            threshold,
        }
    }

    pub fn enroll(
        &self,
        image: &DynamicImage,
        attributes: &IdentityAttributes,
    ) -> Result<EnrollOutcome> {
        let resolver = IdentityResolver::new(self.index, self.store, self.threshold);
        match resolver.resolve(image)? {
            Resolution::Identified { record, .. } => {
                tracing::info!("{} is already enrolled as {}", record.name, record.customer_id);
                return Ok(EnrollOutcome::AlreadyEnrolled(record));
            }
            Resolution::OrphanedMatch { face_id, .. } => {
                return Ok(EnrollOutcome::OrphanedMatch(face_id));
            }
            Resolution::NoMatch => {}
        }

        let face_id = self.index.enroll(image)?;
        let record = CustomerRecord::new(
            face_id.clone(),
            attributes.name.clone(),
            CustomerRecord::enrollment_image_key(&face_id),
            attributes.member_id.clone(),
        );

        if let Err(e) = self.store.put(&record) {
            // Undo the template so the failed enrollment leaves no orphan.
            match self.index.delete(&face_id) {
                Ok(()) => tracing::warn!("Record write failed; removed template {}", face_id),
                Err(delete_err) => tracing::error!(
                    "Record write failed and template {} could not be removed: {}",
                    face_id,
                    delete_err
                ),
            }
            return Err(e);
        }

        let image_stored = match self.upload_image(image, &record.image_key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to upload enrollment image {}: {}", record.image_key, e);
                false
            }
        };

        tracing::info!("Enrolled {} as {}", record.name, face_id);
        Ok(EnrollOutcome::Enrolled(EnrollmentReceipt {
            record,
            image_stored,
        }))
    }

    fn upload_image(&self, image: &DynamicImage, key: &str) -> Result<()> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
        self.blobs.put_object(&bytes, key)
    }
}
