//! Directional Adjacency Model
//!
//! Each node carries twelve optional neighbor references: six translational
//! (`up`, `down`, `left`, `right`, `front`, `back`) and six rotational
//! (`rx+`, `rx-`, `ry+`, `ry-`, `rz+`, `rz-`).
//!
//! Opposite directions are paired, but the store never mirrors a link on its
//! own. Callers that want `A.up = B` and `B.down = A` submit both edges,
//! usually through [`LinkEdge::bidirectional`] in one bulk call.

use crate::models::node::{NodeId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the twelve lattice directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Front,
    Back,
    RxPlus,
    RxMinus,
    RyPlus,
    RyMinus,
    RzPlus,
    RzMinus,
}

impl Direction {
    pub const ALL: [Direction; 12] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::Front,
        Direction::Back,
        Direction::RxPlus,
        Direction::RxMinus,
        Direction::RyPlus,
        Direction::RyMinus,
        Direction::RzPlus,
        Direction::RzMinus,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Front => Direction::Back,
            Direction::Back => Direction::Front,
            Direction::RxPlus => Direction::RxMinus,
            Direction::RxMinus => Direction::RxPlus,
            Direction::RyPlus => Direction::RyMinus,
            Direction::RyMinus => Direction::RyPlus,
            Direction::RzPlus => Direction::RzMinus,
            Direction::RzMinus => Direction::RzPlus,
        }
    }

    /// Canonical token (`"up"`, `"rx+"`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Front => "front",
            Direction::Back => "back",
            Direction::RxPlus => "rx+",
            Direction::RxMinus => "rx-",
            Direction::RyPlus => "ry+",
            Direction::RyMinus => "ry-",
            Direction::RzPlus => "rz+",
            Direction::RzMinus => "rz-",
        }
    }

    /// Name of the link column in the `nodes` table
    pub fn column(self) -> &'static str {
        match self {
            Direction::Up => "up_node_id",
            Direction::Down => "down_node_id",
            Direction::Left => "left_node_id",
            Direction::Right => "right_node_id",
            Direction::Front => "front_node_id",
            Direction::Back => "back_node_id",
            Direction::RxPlus => "rx_plus_node_id",
            Direction::RxMinus => "rx_minus_node_id",
            Direction::RyPlus => "ry_plus_node_id",
            Direction::RyMinus => "ry_minus_node_id",
            Direction::RzPlus => "rz_plus_node_id",
            Direction::RzMinus => "rz_minus_node_id",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    /// Accepts canonical tokens and the `rx_plus` / `rx_minus` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let direction = match s {
            "up" => Direction::Up,
            "down" => Direction::Down,
            "left" => Direction::Left,
            "right" => Direction::Right,
            "front" => Direction::Front,
            "back" => Direction::Back,
            "rx+" | "rx_plus" => Direction::RxPlus,
            "rx-" | "rx_minus" => Direction::RxMinus,
            "ry+" | "ry_plus" => Direction::RyPlus,
            "ry-" | "ry_minus" => Direction::RyMinus,
            "rz+" | "rz_plus" => Direction::RzPlus,
            "rz-" | "rz_minus" => Direction::RzMinus,
            other => {
                return Err(ValidationError::UnknownDirection {
                    token: other.to_string(),
                })
            }
        };
        Ok(direction)
    }
}

impl TryFrom<String> for Direction {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Direction> for String {
    fn from(d: Direction) -> Self {
        d.as_str().to_string()
    }
}

/// The twelve neighbor references of one node, indexed by `Direction`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links([Option<NodeId>; 12]);

impl Links {
    pub fn get(&self, direction: Direction) -> Option<NodeId> {
        self.0[direction.index()]
    }

    pub fn set(&mut self, direction: Direction, target: Option<NodeId>) {
        self.0[direction.index()] = target;
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Set links in `Direction::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Direction, NodeId)> + '_ {
        Direction::ALL
            .iter()
            .filter_map(|&d| self.get(d).map(|id| (d, id)))
    }
}

/// A single directional link update: `node_id.direction = target_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdge {
    pub node_id: NodeId,
    pub direction: Direction,
    pub target_id: NodeId,
}

impl LinkEdge {
    pub fn new(node_id: NodeId, direction: Direction, target_id: NodeId) -> Self {
        Self {
            node_id,
            direction,
            target_id,
        }
    }

    /// The reverse edge (`target.opposite = node`)
    pub fn mirrored(&self) -> Self {
        Self::new(self.target_id, self.direction.opposite(), self.node_id)
    }

    /// Both halves of a symmetric link, ready for one bulk call
    pub fn bidirectional(node_id: NodeId, direction: Direction, target_id: NodeId) -> [Self; 2] {
        let edge = Self::new(node_id, direction, target_id);
        [edge, edge.mirrored()]
    }

    /// Parse `(node, token, target)` triples, failing on the first unknown token
    ///
    /// Returns the position of the bad triple alongside the error so that the
    /// failure can be reported like any other bulk link failure.
    pub fn parse_batch<'a, I>(raw: I) -> Result<Vec<LinkEdge>, (usize, ValidationError)>
    where
        I: IntoIterator<Item = (i64, &'a str, i64)>,
    {
        raw.into_iter()
            .enumerate()
            .map(|(index, (node, token, target))| {
                token
                    .parse()
                    .map(|direction| LinkEdge::new(NodeId(node), direction, NodeId(target)))
                    .map_err(|e| (index, e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposites_are_involutive() {
        for d in Direction::ALL {
            assert_ne!(d, d.opposite());
            assert_eq!(d, d.opposite().opposite());
        }
    }

    #[test]
    fn test_tokens_round_trip_through_display() {
        for d in Direction::ALL {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
    }

    #[test]
    fn test_legacy_spellings_are_accepted() {
        assert_eq!("rx_plus".parse::<Direction>().unwrap(), Direction::RxPlus);
        assert_eq!("rz_minus".parse::<Direction>().unwrap(), Direction::RzMinus);
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownDirection {
                token: "sideways".to_string()
            }
        );
        assert!("UP".parse::<Direction>().is_err());
    }

    #[test]
    fn test_columns_are_distinct() {
        let mut columns: Vec<_> = Direction::ALL.iter().map(|d| d.column()).collect();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(columns.len(), 12);
    }

    #[test]
    fn test_links_get_and_set() {
        let mut links = Links::default();
        assert!(links.is_empty());

        links.set(Direction::RyMinus, Some(NodeId(7)));
        assert_eq!(links.get(Direction::RyMinus), Some(NodeId(7)));
        assert_eq!(links.get(Direction::RyPlus), None);
        assert_eq!(links.iter().collect::<Vec<_>>(), vec![(Direction::RyMinus, NodeId(7))]);
    }

    #[test]
    fn test_bidirectional_pairs_opposites() {
        let [forward, back] = LinkEdge::bidirectional(NodeId(1), Direction::Up, NodeId(2));
        assert_eq!(forward, LinkEdge::new(NodeId(1), Direction::Up, NodeId(2)));
        assert_eq!(back, LinkEdge::new(NodeId(2), Direction::Down, NodeId(1)));
    }

    #[test]
    fn test_parse_batch_reports_failing_position() {
        let ok = LinkEdge::parse_batch([(1, "up", 2), (2, "down", 1)]).unwrap();
        assert_eq!(ok.len(), 2);

        let (index, err) = LinkEdge::parse_batch([(1, "up", 2), (2, "diagonal", 1)]).unwrap_err();
        assert_eq!(index, 1);
        assert!(matches!(err, ValidationError::UnknownDirection { .. }));
    }
}
