//! Membership service: who a customer is and what they have bought.
//!
//! Customers are linked to members through the `member_id` stored on their
//! record. Names are never used for matching.

pub mod client;
pub mod normalize;
pub mod summary;

pub use client::HttpMembershipClient;
pub use summary::{ProductSummary, PurchaseSummary};

use crate::common::{FaceLinkError, Result};
use chrono::NaiveDate;
use reqwest::Url;
use std::fmt;

/// Bearer token returned by `login`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberStatus::Active => write!(f, "Active"),
            MemberStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub member_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tier: String,
    /// Identifier the order endpoint and bio links are keyed by.
    pub link: String,
    pub status: MemberStatus,
    pub joined: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub placed_at: Option<NaiveDate>,
    pub lines: Vec<OrderLine>,
}

pub trait MembershipApi {
    fn login(&self) -> Result<AuthToken>;

    fn members(&self, token: &AuthToken) -> Result<Vec<Member>>;

    fn orders(&self, token: &AuthToken, link: &str) -> Result<Vec<Order>>;
}

pub fn find_member<'a>(members: &'a [Member], member_id: &str) -> Option<&'a Member> {
    let wanted = member_id.trim();
    members.iter().find(|member| member.member_id == wanted)
}

/// Pulls the member identifier out of a bio link: the segment after
/// `bio-link/` or `member/`, otherwise the last path segment.
///
/// Accepts full URLs as well as bare paths like `shop.test/member/jane`.
pub fn member_identifier_from_link(bio_link: &str) -> Option<String> {
    let bio_link = bio_link.trim();
    let path = match Url::parse(bio_link) {
        Ok(url) => url.path().to_string(),
        Err(_) => bio_link
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();

    let after_marker = segments
        .windows(2)
        .find(|pair| {
            pair[0].eq_ignore_ascii_case("bio-link") || pair[0].eq_ignore_ascii_case("member")
        })
        .map(|pair| pair[1]);

    after_marker
        .or_else(|| segments.last().copied())
        .map(str::to_string)
}

/// Link comparison ignores case, as the service does.
pub fn find_member_by_link<'a>(members: &'a [Member], link: &str) -> Option<&'a Member> {
    members
        .iter()
        .find(|member| member.link.eq_ignore_ascii_case(link))
}

/// Resolves a bio link to its member. `Ok(None)` when nobody has that link.
pub fn lookup_by_link(api: &dyn MembershipApi, bio_link: &str) -> Result<Option<Member>> {
    let identifier = member_identifier_from_link(bio_link)
        .ok_or_else(|| FaceLinkError::Membership(format!("Invalid bio link: {:?}", bio_link)))?;

    let token = api.login()?;
    let members = api.members(&token)?;
    let found = find_member_by_link(&members, &identifier).cloned();
    if found.is_none() {
        tracing::info!("No member with link {}", identifier);
    }
    Ok(found)
}

/// Logs in, finds the member and summarises their orders. `Ok(None)` when
/// the service has no member with this id.
pub fn lookup_purchases(
    api: &dyn MembershipApi,
    member_id: &str,
) -> Result<Option<(Member, PurchaseSummary)>> {
    let token = api.login()?;
    let members = api.members(&token)?;
    let Some(member) = find_member(&members, member_id).cloned() else {
        tracing::info!("No member with id {}", member_id);
        return Ok(None);
    };

    let orders = api.orders(&token, &member.link)?;
    tracing::debug!("Member {} has {} orders", member.member_id, orders.len());
    Ok(Some((member, PurchaseSummary::from_orders(&orders))))
}
