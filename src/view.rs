use crate::gateway::PlayerRecord;
use rand::Rng;

/// Shown wherever there is no active game to describe.
pub const PLACEHOLDER: &str = "-";

pub const DEFAULT_DOOR_RANGE: (u64, u64) = (5, 8);

/// Door count of the earliest contract revision.
pub const FIXED_DOOR_COUNT: u64 = 5;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Screen {
    #[default]
    Idle,
    Active,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Door {
    pub index: u64,
    pub label: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OwnerPanel {
    pub house_balance: String,
}

/// Everything the UI renders about the game, derived from one player record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameView {
    pub screen: Screen,
    pub stage: String,
    pub multiplier: String,
    pub winnings: String,
    pub doors: Vec<Door>,
    pub cash_out_visible: bool,
    pub claim_visible: bool,
    pub owner_panel: Option<OwnerPanel>,
}

impl Default for GameView {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl GameView {
    pub fn placeholder() -> Self {
        Self::idle(None)
    }

    pub fn idle(owner_panel: Option<OwnerPanel>) -> Self {
        Self {
            screen: Screen::Idle,
            stage: PLACEHOLDER.to_string(),
            multiplier: PLACEHOLDER.to_string(),
            winnings: PLACEHOLDER.to_string(),
            doors: Vec::new(),
            cash_out_visible: false,
            claim_visible: false,
            owner_panel,
        }
    }

    pub fn active(
        record: &PlayerRecord,
        wager: &Wager,
        door_count: u64,
        claim_min_stage: u64,
        owner_panel: Option<OwnerPanel>,
    ) -> Self {
        let doors = (0..door_count)
            .map(|index| Door {
                index,
                label: format!("Door {}", index + 1),
            })
            .collect();
        Self {
            screen: Screen::Active,
            stage: record.stage.to_string(),
            multiplier: format_multiplier(record.multiplier),
            winnings: wager.format(wager.winnings(record.multiplier)),
            doors,
            cash_out_visible: true,
            claim_visible: record.stage >= claim_min_stage,
            owner_panel,
        }
    }

    pub fn door_count(&self) -> u64 {
        self.doors.len() as u64
    }
}

/// The fixed stake sent with every `start_game`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Wager {
    /// Base units of the wager asset.
    pub amount: u64,
    pub decimals: u32,
    pub ticker: String,
}

impl Default for Wager {
    fn default() -> Self {
        Self {
            amount: 1_000_000_000,
            decimals: 9,
            ticker: "ETH".to_string(),
        }
    }
}

impl Wager {
    pub fn new(amount: u64, decimals: u32, ticker: impl Into<String>) -> Self {
        Self {
            amount,
            decimals,
            ticker: ticker.into(),
        }
    }

    /// `multiplier / 10 * amount`, in base units. Wide enough that no
    /// multiplier can overflow it.
    pub fn winnings(&self, multiplier: u64) -> u128 {
        u128::from(self.amount) * u128::from(multiplier) / 10
    }

    pub fn format(&self, units: impl Into<u128>) -> String {
        format!("{} {}", format_units(units, self.decimals), self.ticker)
    }
}

/// `multiplier` is ten times the real value: `25` renders as `2.5x`.
pub fn format_multiplier(multiplier: u64) -> String {
    format!("{}.{}x", multiplier / 10, multiplier % 10)
}

pub fn format_units(amount: impl Into<u128>, decimals: u32) -> String {
    let amount = amount.into();
    let one_unit = 10u128.saturating_pow(decimals);
    let whole = amount / one_unit;
    let fractional = amount % one_unit;
    if fractional == 0 {
        format!("{}", whole)
    } else {
        let width = decimals as usize;
        format!(
            "{}.{}",
            whole,
            format!("{:0width$}", fractional).trim_end_matches('0')
        )
    }
}

/// Parses a decimal amount such as `0.25` into base units.
pub fn parse_units(raw: &str, decimals: u32) -> Result<u64, String> {
    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(format!("{raw:?} is not an amount"));
    }
    if fraction.len() > decimals as usize {
        return Err(format!("{raw:?} has more than {decimals} decimal places"));
    }
    let digits = format!("{whole}{fraction:0<width$}", width = decimals as usize);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("{raw:?} is not an amount"));
    }
    digits
        .parse::<u64>()
        .map_err(|e| format!("{raw:?} does not fit in a u64: {e}"))
}

/// How many doors a stage offers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DoorLayout {
    /// Uniform in `min..=max`, drawn once per stage.
    Random { min: u64, max: u64 },
    Fixed(u64),
}

impl Default for DoorLayout {
    fn default() -> Self {
        let (min, max) = DEFAULT_DOOR_RANGE;
        DoorLayout::Random { min, max }
    }
}

impl DoorLayout {
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match *self {
            DoorLayout::Random { min, max } if min < max => rng.random_range(min..=max),
            DoorLayout::Random { min, .. } => min,
            DoorLayout::Fixed(count) => count,
        }
    }
}

/// The door count presented for one stage of one game.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DoorRound {
    pub stage: u64,
    pub door_count: u64,
}
