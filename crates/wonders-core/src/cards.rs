//! Static rule data: cards, effects, costs and wonders.
//!
//! This module contains:
//! - Resource, color and science symbol types
//! - Card costs and effect definitions
//! - Card types (rule identity) and card instances (dealt physical copies)
//! - Wonder boards with their day/night stage lists

use crate::effects::Formula;
use crate::expansion::RuleSet;
use crate::rules::DEFAULT_EFFECT_PRIORITY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a card type, e.g. `"LUMBER_YARD"`
pub type CardId = String;

/// Resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resource {
    Wood,
    Stone,
    Clay,
    Ore,
    Glass,
    Papyrus,
    Loom,
}

impl Resource {
    /// All resource types
    pub const ALL: [Resource; 7] = [
        Resource::Wood,
        Resource::Stone,
        Resource::Clay,
        Resource::Ore,
        Resource::Glass,
        Resource::Papyrus,
        Resource::Loom,
    ];

    /// Raw materials (brown cards); everything else is a manufactured good
    pub fn is_raw(&self) -> bool {
        matches!(
            self,
            Resource::Wood | Resource::Stone | Resource::Clay | Resource::Ore
        )
    }
}

/// Card color category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    /// Raw materials
    Brown,
    /// Manufactured goods
    Grey,
    /// Civilian structures
    Blue,
    /// Commercial structures
    Yellow,
    /// Military structures
    Red,
    /// Scientific structures
    Green,
    /// Guilds
    Purple,
    /// Cities expansion
    Black,
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BROWN" => Ok(Color::Brown),
            "GREY" => Ok(Color::Grey),
            "BLUE" => Ok(Color::Blue),
            "YELLOW" => Ok(Color::Yellow),
            "RED" => Ok(Color::Red),
            "GREEN" => Ok(Color::Green),
            "PURPLE" => Ok(Color::Purple),
            "BLACK" => Ok(Color::Black),
            other => Err(ParseColorError(other.to_string())),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Brown => "BROWN",
            Color::Grey => "GREY",
            Color::Blue => "BLUE",
            Color::Yellow => "YELLOW",
            Color::Red => "RED",
            Color::Green => "GREEN",
            Color::Purple => "PURPLE",
            Color::Black => "BLACK",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown card color `{0}`")]
pub struct ParseColorError(pub String);

/// Science symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScienceSymbol {
    Compass,
    Gear,
    Tablet,
}

impl ScienceSymbol {
    pub const ALL: [ScienceSymbol; 3] = [
        ScienceSymbol::Compass,
        ScienceSymbol::Gear,
        ScienceSymbol::Tablet,
    ];
}

/// Which neighbor trades a discount applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountScope {
    /// Raw materials bought from the left neighbor
    RawLeft,
    /// Raw materials bought from the right neighbor
    RawRight,
    /// Raw materials bought from either neighbor
    RawBoth,
    /// Manufactured goods bought from either neighbor
    Manufactured,
}

/// Abilities the core records but whose resolution belongs to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialAbility {
    /// Build one card per age for free
    FreeBuild,
    /// Build a card from the discard pile
    PlayDiscard,
    /// Play the last card of each age instead of discarding it
    BuildLastCard,
    /// Copy a guild built by a neighbor
    CopyGuild,
}

/// What an effect does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    /// Produce a fixed resource every turn
    ProduceResource {
        resource: Resource,
        #[serde(default = "one")]
        amount: u32,
    },
    /// Produce one of several resources, picked when paying
    ProduceChoice { choices: Vec<Resource> },
    /// Gain coins once
    GainCoins { value: u32 },
    /// Gain coins once, counted by formula
    GainCoinsFormula { formula: Formula },
    /// Add shields to military power
    GainMilitary { value: u32 },
    /// Add one science symbol
    GainScience { symbol: ScienceSymbol },
    /// Add a science symbol of the owner's choice, picked at scoring
    GainScienceWild,
    /// Victory points at game end
    GainVp { value: u32 },
    /// Victory points at game end, counted by formula
    GainVpFormula { formula: Formula },
    /// Cheaper trading with neighbors
    TradeDiscount { scope: DiscountScope },
    /// Recorded ability resolved outside the core
    Special { ability: SpecialAbility },
}

fn one() -> u32 {
    1
}

fn default_priority() -> u8 {
    DEFAULT_EFFECT_PRIORITY
}

/// A single effect of a card or wonder stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(flatten)]
    pub kind: EffectKind,
    /// Lower resolves first
    #[serde(default = "default_priority")]
    pub priority: u8,
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            priority: DEFAULT_EFFECT_PRIORITY,
        }
    }

    pub fn with_priority(kind: EffectKind, priority: u8) -> Self {
        Self { kind, priority }
    }
}

/// Price of a card or wonder stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    #[serde(default)]
    pub coins: u32,
    #[serde(default)]
    pub resources: BTreeMap<Resource, u32>,
    /// Card types that make this card free when already built
    #[serde(default)]
    pub chain_from: Vec<CardId>,
}

impl Cost {
    /// Cost with no requirement at all
    pub fn free() -> Self {
        Self::default()
    }
}

/// A card type: the rule identity shared by all physical copies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardType {
    pub id: CardId,
    pub name: String,
    pub age: u8,
    pub color: Color,
    /// Player-count thresholds; one copy enters the pool per threshold
    /// that is at most the seat count. Guilds leave this empty.
    #[serde(default)]
    pub players: Vec<u8>,
    #[serde(default)]
    pub cost: Cost,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub expansion: RuleSet,
}

impl CardType {
    /// Number of copies in a game with `player_count` seats
    pub fn copies_for(&self, player_count: u8) -> usize {
        self.players.iter().filter(|&&p| p <= player_count).count()
    }

    /// Flat victory points declared by the card
    pub fn declared_vp(&self) -> Option<u32> {
        self.effects.iter().find_map(|e| match e.kind {
            EffectKind::GainVp { value } => Some(value),
            _ => None,
        })
    }

    /// Science symbol granted by the card
    pub fn science_symbol(&self) -> Option<ScienceSymbol> {
        self.effects.iter().find_map(|e| match e.kind {
            EffectKind::GainScience { symbol } => Some(symbol),
            _ => None,
        })
    }

    /// Whether any effect produces a resource
    pub fn produces_resources(&self) -> bool {
        self.effects.iter().any(|e| {
            matches!(
                e.kind,
                EffectKind::ProduceResource { .. } | EffectKind::ProduceChoice { .. }
            )
        })
    }

    /// Whether this card is built for free because a chain prerequisite is
    /// among `built`
    pub fn chained_from<'a>(&self, mut built: impl Iterator<Item = &'a CardInstance>) -> bool {
        !self.cost.chain_from.is_empty()
            && built.any(|instance| self.cost.chain_from.contains(&instance.card))
    }
}

/// A physical card dealt into a hand. Several instances may share a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardInstance {
    /// Card type id
    pub card: CardId,
    /// Copy number, starting at 1
    pub copy: u8,
}

impl CardInstance {
    pub fn new(card: impl Into<CardId>, copy: u8) -> Self {
        Self {
            card: card.into(),
            copy,
        }
    }
}

impl fmt::Display for CardInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.card, self.copy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed card instance id `{0}`, expected CARD#COPY")]
pub struct ParseInstanceError(pub String);

impl FromStr for CardInstance {
    type Err = ParseInstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (card, copy) = s
            .rsplit_once('#')
            .ok_or_else(|| ParseInstanceError(s.to_string()))?;
        let copy = copy
            .parse::<u8>()
            .map_err(|_| ParseInstanceError(s.to_string()))?;
        if card.is_empty() {
            return Err(ParseInstanceError(s.to_string()));
        }
        Ok(Self::new(card, copy))
    }
}

impl TryFrom<String> for CardInstance {
    type Error = ParseInstanceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CardInstance> for String {
    fn from(instance: CardInstance) -> Self {
        instance.to_string()
    }
}

/// Which face of a wonder board is in play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WonderSide {
    Day,
    Night,
}

/// One buildable stage of a wonder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WonderStage {
    #[serde(default)]
    pub cost: Cost,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// A wonder board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wonder {
    pub id: String,
    pub name: String,
    /// Resource the board itself produces
    pub resource: Resource,
    pub day: Vec<WonderStage>,
    pub night: Vec<WonderStage>,
}

impl Wonder {
    /// Stages of the given side
    pub fn stages(&self, side: WonderSide) -> &[WonderStage] {
        match side {
            WonderSide::Day => &self.day,
            WonderSide::Night => &self.night,
        }
    }
}
