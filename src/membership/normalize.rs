//! Wire shapes of the membership service and their mapping to [`Member`]
//! and [`Order`].
//!
//! The service is loose about types (ids arrive as numbers or strings) and
//! repeats fields between a member and its nested `user`. All of that is
//! resolved here, once.

use crate::membership::{Member, MemberStatus, Order, OrderLine};
use chrono::NaiveDate;
use serde::Deserialize;

const DEFAULT_TIER: &str = "Standard";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MembersResponse {
    #[serde(default)]
    pub data: Option<MembersPage>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MembersPage {
    #[serde(default)]
    pub data: Vec<RawMember>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTier {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMember {
    pub member_id: Option<RawId>,
    pub id: Option<RawId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub link: Option<String>,
    pub user: Option<RawUser>,
    pub tier: Option<RawTier>,
    pub status: Option<RawId>,
    pub created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MemberDataResponse {
    #[serde(default)]
    pub data: Option<MemberData>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MemberData {
    pub user: Option<MemberDataUser>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MemberDataUser {
    #[serde(default)]
    pub orders: Vec<RawOrder>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawOrder {
    pub paid_date: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub order_products: Vec<RawOrderProduct>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawOrderProduct {
    pub product: RawProduct,
    pub product_quantity: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProduct {
    pub name: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `None` when the entry carries no usable member id.
pub(crate) fn member(raw: RawMember) -> Option<Member> {
    let member_id = raw
        .member_id
        .or(raw.id)
        .map(RawId::into_string)
        .filter(|id| !id.is_empty())?;
    let user = raw.user.unwrap_or_default();

    let link = non_blank(user.link)
        .or_else(|| non_blank(raw.link))
        .unwrap_or_else(|| member_id.clone());
    let tier = raw
        .tier
        .and_then(|tier| non_blank(tier.name))
        .unwrap_or_else(|| DEFAULT_TIER.to_string());
    let status = match raw.status.map(RawId::into_string).as_deref() {
        Some("1") => MemberStatus::Active,
        _ => MemberStatus::Inactive,
    };

    Some(Member {
        name: non_blank(user.name).or_else(|| non_blank(raw.name)),
        email: non_blank(user.email).or_else(|| non_blank(raw.email)),
        phone: non_blank(user.phone).or_else(|| non_blank(raw.phone)),
        member_id,
        tier,
        link,
        status,
        joined: raw.created_at.as_deref().and_then(service_date),
    })
}

pub(crate) fn members(response: MembersResponse) -> Vec<Member> {
    let raw = response.data.map(|page| page.data).unwrap_or_default();
    let total = raw.len();
    let members: Vec<Member> = raw.into_iter().filter_map(member).collect();
    if members.len() < total {
        tracing::warn!("Skipped {} member entries without an id", total - members.len());
    }
    members
}

/// Dates arrive as `YYYY-MM-DD` optionally followed by a time part.
fn service_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub(crate) fn order(raw: RawOrder) -> Order {
    let placed_at = raw
        .paid_date
        .as_deref()
        .and_then(service_date)
        .or_else(|| raw.created_at.as_deref().and_then(service_date));

    let lines = raw
        .order_products
        .into_iter()
        .filter_map(|line| {
            Some(OrderLine {
                product: non_blank(line.product.name)?,
                quantity: line.product_quantity,
            })
        })
        .collect();

    Order { placed_at, lines }
}

pub(crate) fn orders(response: MemberDataResponse) -> Vec<Order> {
    response
        .data
        .and_then(|data| data.user)
        .map(|user| user.orders.into_iter().map(order).collect())
        .unwrap_or_default()
}
