use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. Dates are midnight UTC.
pub type Ms = i64;

pub const DAY_MS: Ms = 86_400_000;

/// A pet of size `s` needs at least `s / SIZE_PER_SQUARE_METER` square meters.
pub const SIZE_PER_SQUARE_METER: f64 = 4.0;

/// Midnight UTC of `date`, in Unix milliseconds.
pub fn date_ms(date: NaiveDate) -> Ms {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Date range `[start, end]` with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Returns true if `self` fully contains `other`. Both bounds are inclusive,
    /// so a span always contains itself.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Who a window was handed to, and when. All three fields exist together or
/// not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub guest_owner_id: Ulid,
    pub guest_pet_id: Ulid,
    pub booked_at: Ms,
}

/// An advertised availability window on a cage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: Ulid,
    pub span: Span,
    pub claim: Option<Claim>,
}

impl Window {
    pub fn open(id: Ulid, span: Span) -> Self {
        Self { id, span, claim: None }
    }

    pub fn is_open(&self) -> bool {
        self.claim.is_none()
    }

    /// Open and wide enough to host a stay over `stay`.
    pub fn can_host(&self, stay: &Span) -> bool {
        self.is_open() && self.span.contains_span(stay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub cage_ids: Vec<Ulid>,
    pub pet_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub species: String,
    pub size: f64,
    pub is_dangerous: bool,
}

impl Pet {
    /// Smallest cage (square meters) this pet may be placed in.
    pub fn min_capacity(&self) -> f64 {
        self.size / SIZE_PER_SQUARE_METER
    }
}

/// Registration input for a cage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCage {
    pub name: String,
    pub square_meters: f64,
    pub is_carpeted: bool,
    pub has_toys: bool,
    pub allows_dangerous: bool,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct CageState {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub square_meters: f64,
    pub is_carpeted: bool,
    pub has_toys: bool,
    pub allows_dangerous: bool,
    pub price: f64,
    /// Windows in the order they were added.
    pub windows: Vec<Window>,
}

impl CageState {
    pub fn new(id: Ulid, owner_id: Ulid, cage: NewCage) -> Self {
        Self {
            id,
            owner_id,
            name: cage.name,
            square_meters: cage.square_meters,
            is_carpeted: cage.is_carpeted,
            has_toys: cage.has_toys,
            allows_dangerous: cage.allows_dangerous,
            price: cage.price,
            windows: Vec::new(),
        }
    }

    /// Capacity and danger policy fit `pet`. Says nothing about dates.
    pub fn fits(&self, pet: &Pet) -> bool {
        self.square_meters >= pet.min_capacity() && (!pet.is_dangerous || self.allows_dangerous)
    }

    /// Append a window. Existing windows (and their claims) are left untouched.
    pub fn push_window(&mut self, window: Window) {
        self.windows.push(window);
    }

    /// First window, in stored order, that can host `stay`.
    pub fn first_open_window(&self, stay: &Span) -> Option<usize> {
        self.windows.iter().position(|w| w.can_host(stay))
    }

    /// Record a claim on window `id`. A window that is already claimed keeps
    /// its original claim. Returns whether the claim was recorded.
    pub fn set_claim(&mut self, id: Ulid, claim: Claim) -> bool {
        match self.windows.iter_mut().find(|w| w.id == id) {
            Some(w) if w.claim.is_none() => {
                w.claim = Some(claim);
                true
            }
            _ => false,
        }
    }

    pub fn info(&self) -> CageInfo {
        CageInfo {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name.clone(),
            square_meters: self.square_meters,
            is_carpeted: self.is_carpeted,
            has_toys: self.has_toys,
            allows_dangerous: self.allows_dangerous,
            price: self.price,
        }
    }
}

/// WAL record format. Replaying these in order rebuilds the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OwnerCreated {
        id: Ulid,
        name: String,
        email: String,
    },
    PetRegistered {
        id: Ulid,
        owner_id: Ulid,
        name: String,
        species: String,
        size: f64,
        is_dangerous: bool,
    },
    CageRegistered {
        id: Ulid,
        owner_id: Ulid,
        cage: NewCage,
    },
    WindowAdded {
        id: Ulid,
        cage_id: Ulid,
        span: Span,
    },
    WindowClaimed {
        id: Ulid,
        cage_id: Ulid,
        claim: Claim,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Cage attributes without its windows.
#[derive(Debug, Clone, PartialEq)]
pub struct CageInfo {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub square_meters: f64,
    pub is_carpeted: bool,
    pub has_toys: bool,
    pub allows_dangerous: bool,
    pub price: f64,
}

/// A (cage, window) pair returned by search. Eligible when produced, not
/// reserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub cage: CageInfo,
    pub window: Window,
}

/// A claimed window as seen by the guest who holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestBooking {
    pub cage_id: Ulid,
    pub cage_name: String,
    pub window: Window,
}
