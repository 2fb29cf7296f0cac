use crate::camera::{Camera, ReplayFrames};
use crate::cli::visualization;
use crate::common::{AppContext, Result};
use crate::core::capture::{capture_face_with, CaptureSettings, GateStep};
use crate::core::detector::FaceDetector;
use crate::core::enrollment::EnrollOutcome;
use crate::core::reconciler::{IdentityAttributes, RepairOutcome};
use crate::core::resolver::Resolution;
use crate::membership::{self, HttpMembershipClient, Member, PurchaseSummary};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::Duration;

const REPLAY_INTERVAL: Duration = Duration::from_millis(100);

/// Where the face image for `identify` and `enroll` comes from.
#[derive(Debug, Clone)]
pub enum FrameInput {
    Camera,
    Replay(PathBuf),
    /// A still image used as-is, without the capture gate.
    Image(PathBuf),
}

impl FrameInput {
    pub fn from_args(image: Option<PathBuf>, replay: Option<PathBuf>) -> Self {
        match (image, replay) {
            (Some(path), _) => FrameInput::Image(path),
            (None, Some(dir)) => FrameInput::Replay(dir),
            (None, None) => FrameInput::Camera,
        }
    }
}

fn print_step(step: &GateStep) {
    match step {
        GateStep::Holding { held, .. } => println!("  Hold still... {:.1}s", held.as_secs_f32()),
        GateStep::TooSmall { .. } => println!("  Move closer to the camera"),
        _ => {}
    }
}

/// Runs the capture gate over the selected input and returns the face crop.
fn acquire_face(ctx: &AppContext, input: &FrameInput) -> Result<Option<DynamicImage>> {
    if let FrameInput::Image(path) = input {
        println!("Using image {}", path.display());
        return Ok(Some(image::open(path)?));
    }

    let detector = FaceDetector::new(&ctx.config, &ctx.models_base())?;
    let settings = CaptureSettings::from(&ctx.config.capture);
    println!("Look at the camera...");

    let captured = match input {
        FrameInput::Replay(dir) => {
            let mut frames = ReplayFrames::from_dir(dir, REPLAY_INTERVAL)?;
            capture_face_with(&mut frames, &detector, &settings, |_, step| print_step(step))?
        }
        _ => {
            let camera = Camera::new(&ctx.config)?;
            let mut session = camera.start_session()?;
            capture_face_with(&mut session, &detector, &settings, |_, step| print_step(step))?
        }
    };

    let Some(captured) = captured else {
        return Ok(None);
    };

    for suggestion in captured.quality.get_improvement_suggestions() {
        println!("  Tip: {}", suggestion);
    }
    for path in visualization::save_capture(&ctx.dev_mode, &captured)? {
        println!("Saved {}", path.display());
    }
    Ok(Some(captured.crop))
}

pub fn identify(ctx: &AppContext, input: &FrameInput, with_membership: bool) -> Result<()> {
    let Some(face) = acquire_face(ctx, input)? else {
        println!("No face captured.");
        return Ok(());
    };

    let resolution = match ctx.resolver().resolve(&face) {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::warn!("Resolution failed: {}", e);
            if e.is_transient() {
                println!("Not identified: {} (try again)", e);
            } else {
                println!("Not identified: {}", e);
            }
            return Ok(());
        }
    };

    match resolution {
        Resolution::Identified { record, similarity } => {
            println!("Identified {} ({:.1}% similarity)", record.name, similarity);
            println!("  Customer ID: {}", record.customer_id);
            println!("  Registered:  {}", record.registration_date.format("%Y-%m-%d"));
            match &record.member_id {
                Some(member_id) => {
                    println!("  Member ID:   {}", member_id);
                    if with_membership {
                        show_membership(ctx, member_id);
                    }
                }
                None => println!("  No linked membership"),
            }
        }
        Resolution::NoMatch => println!("Not identified: no matching customer."),
        Resolution::OrphanedMatch { face_id, similarity } => {
            println!(
                "Face {} matched ({:.1}%) but has no customer record.",
                face_id, similarity
            );
            println!("Run `facelink repair {} --name <NAME>` to relink it.", face_id);
        }
    }
    Ok(())
}

fn show_membership(ctx: &AppContext, member_id: &str) {
    if !ctx.config.membership.is_configured() {
        println!("  Membership service not configured");
        return;
    }

    let lookup = HttpMembershipClient::from_config(&ctx.config.membership)
        .and_then(|client| membership::lookup_purchases(&client, member_id));

    match lookup {
        Ok(Some((member, summary))) => {
            print_member(&member);
            print_purchases(&summary);
        }
        Ok(None) => println!("  Member {} not found in membership service", member_id),
        Err(e) => {
            tracing::warn!("Membership lookup failed: {}", e);
            println!("  Membership lookup failed: {}", e);
        }
    }
}

fn print_member(member: &Member) {
    println!("  Tier:        {}", member.tier);
    println!("  Status:      {}", member.status);
    println!("  Link:        {}", member.link);
    if let Some(email) = &member.email {
        println!("  Email:       {}", email);
    }
    if let Some(phone) = &member.phone {
        println!("  Phone:       {}", phone);
    }
    if let Some(joined) = member.joined {
        println!("  Joined:      {}", joined.format("%Y-%m-%d"));
    }
}

/// Looks a member up from their bio link.
pub fn member(ctx: &AppContext, bio_link: &str) -> Result<()> {
    let client = HttpMembershipClient::from_config(&ctx.config.membership)?;

    match membership::lookup_by_link(&client, bio_link)? {
        Some(member) => {
            println!(
                "{} (member {})",
                member.name.as_deref().unwrap_or("Name not available"),
                member.member_id
            );
            print_member(&member);
        }
        None => println!("No member found for {}", bio_link),
    }
    Ok(())
}

fn print_purchases(summary: &PurchaseSummary) {
    if summary.is_empty() {
        println!("  No purchases");
        return;
    }

    println!("  Purchases ({} items):", summary.total_items);
    for product in &summary.products {
        let last = product
            .last_ordered
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("    {:<30} x{:<4} last {}", product.product, product.quantity, last);
    }
}

pub fn enroll(
    ctx: &AppContext,
    input: &FrameInput,
    name: &str,
    member_id: Option<String>,
) -> Result<()> {
    let attributes = IdentityAttributes::new(name, member_id);
    let Some(face) = acquire_face(ctx, input)? else {
        println!("No face captured.");
        return Ok(());
    };

    match ctx.enrollment().enroll(&face, &attributes)? {
        EnrollOutcome::Enrolled(receipt) => {
            println!("Enrolled {} as {}", receipt.record.name, receipt.record.customer_id);
            if !receipt.image_stored {
                println!("Warning: the enrollment image could not be stored.");
            }
        }
        EnrollOutcome::AlreadyEnrolled(record) => {
            println!("Already enrolled as {} ({})", record.name, record.customer_id);
        }
        EnrollOutcome::OrphanedMatch(face_id) => {
            println!("This face is indexed as {} but has no record.", face_id);
            println!("Run `facelink repair {} --name <NAME>` instead.", face_id);
        }
    }
    Ok(())
}

pub fn repair(ctx: &AppContext, face_id: &str, name: &str, member_id: Option<String>) -> Result<()> {
    let attributes = IdentityAttributes::new(name, member_id);

    match ctx.reconciler().repair_orphaned_match(face_id, &attributes)? {
        RepairOutcome::Repaired(record) => {
            println!("Linked face {} to {}", record.customer_id, record.name);
        }
        RepairOutcome::AlreadyLinked(record) => {
            println!("Face {} is already linked to {}; nothing changed.", face_id, record.name);
        }
        RepairOutcome::TemplateMissing => {
            println!("Face {} is not in the index; nothing to repair.", face_id);
        }
    }
    Ok(())
}

pub fn cleanup(ctx: &AppContext, dry_run: bool) -> Result<()> {
    let reconciler = ctx.reconciler();

    if dry_run {
        let orphans = reconciler.find_orphaned_faces()?;
        println!("{} orphaned faces would be removed:", orphans.len());
        for face_id in orphans {
            println!("  {}", face_id);
        }
        return Ok(());
    }

    let report = reconciler.cleanup_orphaned_faces()?;
    println!(
        "Cleanup complete. Removed {} of {} faces.",
        report.removed_count(),
        report.scanned
    );
    Ok(())
}

pub fn audit(ctx: &AppContext) -> Result<()> {
    let report = ctx.reconciler().audit()?;
    if report.is_consistent() {
        println!("Index and records are consistent.");
        return Ok(());
    }

    println!("Faces without a customer record: {}", report.orphaned_faces.len());
    for face_id in &report.orphaned_faces {
        println!("  {}", face_id);
    }
    println!("Customer records without a face: {}", report.dangling_records.len());
    for customer_id in &report.dangling_records {
        println!("  {}", customer_id);
    }
    Ok(())
}

pub fn faces(ctx: &AppContext) -> Result<()> {
    let face_ids = ctx.index().list_all()?;
    println!("{} faces in collection {}", face_ids.len(), ctx.config.index.collection_id);

    for face_id in face_ids {
        match ctx.store().get(&face_id)? {
            Some(record) => println!("  {}  {}", face_id, record.name),
            None => println!("  {}  (no record)", face_id),
        }
    }
    Ok(())
}
