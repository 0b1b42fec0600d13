use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mp_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------        MatchId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl FromStr for MatchId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for MatchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl MatchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        UserId         ---------------------------------------------------------
/// The identity of a participant, as issued by the (external) identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      MatchStage       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum MatchStage {
    /// Players may join freely. Nobody owes anything yet.
    FreeJoining,
    /// The minimum quorum has been reached and shares have been priced.
    SoftLock,
    /// Players are paying their shares. The window closes at `payment_window_end`.
    PaymentWindow,
    /// The window has closed and non-payers have been removed. Awaiting organizer confirmation.
    HardLock,
    /// The final team is settled.
    Confirmed,
    /// The organizer called the match off. Everyone who paid has been refunded.
    Cancelled,
}

impl MatchStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStage::Confirmed | MatchStage::Cancelled)
    }

    /// True while the payment window is open for business (soft lock is transient, but a payment arriving in that
    /// instant is still valid).
    pub fn accepts_payments(&self) -> bool {
        matches!(self, MatchStage::SoftLock | MatchStage::PaymentWindow)
    }

    /// Position in the forward progression. Used to verify that stages never regress outside the two documented
    /// escape hatches.
    pub fn rank(&self) -> u8 {
        match self {
            MatchStage::FreeJoining => 0,
            MatchStage::SoftLock => 1,
            MatchStage::PaymentWindow => 2,
            MatchStage::HardLock => 3,
            MatchStage::Confirmed => 4,
            MatchStage::Cancelled => 5,
        }
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: MatchStage) -> bool {
        use MatchStage::*;
        match (self, to) {
            (FreeJoining, SoftLock) | (SoftLock, PaymentWindow) | (PaymentWindow, HardLock) | (HardLock, Confirmed) => {
                true
            },
            (HardLock, FreeJoining) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStage::FreeJoining => write!(f, "FreeJoining"),
            MatchStage::SoftLock => write!(f, "SoftLock"),
            MatchStage::PaymentWindow => write!(f, "PaymentWindow"),
            MatchStage::HardLock => write!(f, "HardLock"),
            MatchStage::Confirmed => write!(f, "Confirmed"),
            MatchStage::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

impl ConversionError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

impl FromStr for MatchStage {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FreeJoining" => Ok(Self::FreeJoining),
            "SoftLock" => Ok(Self::SoftLock),
            "PaymentWindow" => Ok(Self::PaymentWindow),
            "HardLock" => Ok(Self::HardLock),
            "Confirmed" => Ok(Self::Confirmed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid match stage: {s}"))),
        }
    }
}

impl From<String> for MatchStage {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid match stage: {value}. But this conversion cannot fail. Defaulting to FreeJoining");
            MatchStage::FreeJoining
        })
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
/// One participant's obligation within a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub user_id: UserId,
    /// Mirrors the match stage at the time of the last update to this record
    pub stage: MatchStage,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    /// Reference for the most recent successful charge, as returned by the payment capture service.
    pub transaction_ref: Option<String>,
}

impl PaymentStatus {
    pub fn new(user_id: UserId, stage: MatchStage, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            stage,
            amount_due: Money::ZERO,
            amount_paid: Money::ZERO,
            is_paid: false,
            paid_at: None,
            payment_deadline: None,
            joined_at,
            transaction_ref: None,
        }
    }

    /// Re-derive `is_paid` from the amounts. Only meaningful once shares are priced at soft lock, after which a zero
    /// share is settled from the start.
    pub fn refresh_paid_flag(&mut self) {
        self.is_paid = self.amount_paid >= self.amount_due;
    }
}

//--------------------------------------   MatchPaymentState   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPaymentState {
    pub match_id: MatchId,
    pub organizer_id: UserId,
    pub stage: MatchStage,
    pub min_players: u32,
    pub max_players: u32,
    pub current_player_count: u32,
    pub total_cost: Money,
    pub cost_per_player: Money,
    /// When the event itself starts. Determines how long the payment window stays open.
    pub starts_at: DateTime<Utc>,
    pub payment_window_start: Option<DateTime<Utc>>,
    pub payment_window_end: Option<DateTime<Utc>>,
    pub player_payments: Vec<PaymentStatus>,
    pub cancel_reason: Option<String>,
    /// Optimistic concurrency token. Incremented by the store on every successful write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchPaymentState {
    pub fn participant(&self, user_id: &UserId) -> Option<&PaymentStatus> {
        self.player_payments.iter().find(|p| &p.user_id == user_id)
    }

    pub fn participant_mut(&mut self, user_id: &UserId) -> Option<&mut PaymentStatus> {
        self.player_payments.iter_mut().find(|p| &p.user_id == user_id)
    }

    pub fn has_quorum(&self) -> bool {
        self.current_player_count >= self.min_players
    }

    pub fn is_full(&self) -> bool {
        self.current_player_count >= self.max_players
    }

    pub fn paid_count(&self) -> usize {
        self.player_payments.iter().filter(|p| p.is_paid).count()
    }

    pub fn total_paid(&self) -> Money {
        self.player_payments.iter().map(|p| p.amount_paid).sum()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.player_payments.iter().map(|p| p.user_id.clone()).collect()
    }
}

//--------------------------------------        NewMatch       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMatch {
    pub match_id: MatchId,
    pub organizer_id: UserId,
    pub min_players: u32,
    pub max_players: u32,
    pub total_cost: Money,
    pub starts_at: DateTime<Utc>,
}

impl NewMatch {
    pub fn new(
        match_id: MatchId,
        organizer_id: UserId,
        min_players: u32,
        max_players: u32,
        total_cost: Money,
        starts_at: DateTime<Utc>,
    ) -> Self {
        Self { match_id, organizer_id, min_players, max_players, total_cost, starts_at }
    }
}

//--------------------------------------      StageChange      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: MatchStage,
    pub to: MatchStage,
    pub reason: String,
}

impl StageChange {
    pub fn new<S: Into<String>>(from: MatchStage, to: MatchStage, reason: S) -> Self {
        Self { from, to, reason: reason.into() }
    }
}

/// A row from the append-only stage audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLogEntry {
    pub id: i64,
    pub match_id: MatchId,
    pub from_stage: MatchStage,
    pub to_stage: MatchStage,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Adjustments       ---------------------------------------------------------
/// Money that must move after a transition: a refund to the participant, or an additional amount they owe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub user_id: UserId,
    pub amount: Money,
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub user_id: UserId,
    /// `amount_paid - cost_per_player`. Positive values are refunds; negative values are top-ups owed.
    pub amount: Money,
    pub transaction_ref: Option<String>,
}

impl Adjustment {
    pub fn is_refund(&self) -> bool {
        self.amount.is_positive()
    }
}

//--------------------------------------     JournalEntry      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum JournalEntryKind {
    Charge,
    Refund,
    TopUpRequest,
}

impl Display for JournalEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalEntryKind::Charge => write!(f, "Charge"),
            JournalEntryKind::Refund => write!(f, "Refund"),
            JournalEntryKind::TopUpRequest => write!(f, "TopUpRequest"),
        }
    }
}

/// A ledger line written by the built-in ledger payment capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub transaction_ref: String,
    pub match_id: MatchId,
    pub user_id: UserId,
    pub kind: JournalEntryKind,
    pub amount: Money,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}
