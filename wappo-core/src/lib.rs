//! Wappo game logic: a 6x6 board of typed cells, hero and enemy pieces, and
//! the deterministic turn engine that resolves one full turn per direction
//! input.
//!
//! # Grid addressing
//!
//! ```text
//! index = y * 6 + x, x = index % 6, y = index / 6
//!
//!    0  1  2  3  4  5
//!    6  7  8  9 10 11
//!   12 13 14 15 16 17
//!   18 19 20 21 22 23
//!   24 25 26 27 28 29
//!   30 31 32 33 34 35
//! ```
//!
//! North decreases `y`, South increases it. `Wall` is a virtual cell type
//! reported for any coordinate outside the grid; it is never stored.
//!
//! # Turn resolution
//!
//! One call to [`Game::simulate_turn`] runs the full phase sequence:
//!
//! 1. Wappo alone attempts one move in the input direction.
//! 2. Friends move in synchronized step rounds (one round per step, swept in
//!    ticks until movement settles, capped at [`TICK_CAP`] ticks).
//! 3. Win check: every hero on a beehive wins the level.
//! 4. Enemies move in their own step rounds, ordered by axis then order,
//!    each following its own current direction.
//! 5. Move counters reset and the turn reports `Continuing`.
//!
//! A fatal move anywhere in the sequence short-circuits the remaining phases
//! with `Lost`; the dying piece keeps its pre-move location.
//!
//! # Snapshot encoding
//!
//! Dynamic state serializes to a canonical string of three `|`-separated
//! segments (see [`Snapshot`]):
//!
//! ```text
//! <wappo cell>|<friend cells by order>|<enemy cell:direction by order>
//!
//! absent order slots encode as "-"; example: 14|-,8|5:NE,-,30:W
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Board edge length in cells.
pub const GRID_SIZE: u8 = 6;

/// Total number of cells on the board.
pub const CELL_COUNT: u8 = GRID_SIZE * GRID_SIZE;

/// Sweep limit per step round. Bounds the fixed-point iteration that
/// emulates simultaneous movement, so circular mutual blocking cannot
/// livelock a turn.
pub const TICK_CAP: u32 = 6;

/// Order key of the controllable hero.
pub const WAPPO_ORDER: u8 = 0;

// ============================================================================
// Directions and positions
// ============================================================================

/// One of the eight compass directions.
///
/// Player inputs and solver moves use only the four cardinals; the diagonals
/// exist for enemy movement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "NE")]
    NorthEast,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "SW")]
    SouthWest,
    #[serde(rename = "NW")]
    NorthWest,
}

impl Direction {
    /// The four player-facing directions, in input order.
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit vector `(dx, dy)` for this direction.
    #[inline]
    pub fn delta(self) -> (i8, i8) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// The 180-degree opposite direction.
    #[inline]
    pub fn reversed(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::NorthEast => Direction::SouthWest,
            Direction::SouthWest => Direction::NorthEast,
            Direction::NorthWest => Direction::SouthEast,
            Direction::SouthEast => Direction::NorthWest,
        }
    }

    /// Check if this is one of the four cardinal directions.
    #[inline]
    pub fn is_cardinal(self) -> bool {
        matches!(
            self,
            Direction::North | Direction::East | Direction::South | Direction::West
        )
    }

    /// Check if this is one of the four diagonal directions.
    #[inline]
    pub fn is_diagonal(self) -> bool {
        !self.is_cardinal()
    }

    /// Short compass code, shared by the snapshot codec and level files.
    pub fn code(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::East => "E",
            Direction::South => "S",
            Direction::West => "W",
            Direction::NorthEast => "NE",
            Direction::SouthEast => "SE",
            Direction::SouthWest => "SW",
            Direction::NorthWest => "NW",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Direction {
    type Err = SnapshotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Direction::North),
            "E" => Ok(Direction::East),
            "S" => Ok(Direction::South),
            "W" => Ok(Direction::West),
            "NE" => Ok(Direction::NorthEast),
            "SE" => Ok(Direction::SouthEast),
            "SW" => Ok(Direction::SouthWest),
            "NW" => Ok(Direction::NorthWest),
            _ => Err(SnapshotParseError::BadDirection(s.to_string())),
        }
    }
}

/// Movement axis of an enemy. The derived ordering (`Horizontal < Vertical <
/// Diagonal`) is the primary key of enemy phase ordering.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Axis {
    Horizontal,
    Vertical,
    Diagonal,
}

/// Position on the 6x6 board (0-35).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Pos(pub u8);

impl Pos {
    /// Create a position from x and y coordinates (0-5 each).
    #[inline]
    pub fn from_xy(x: u8, y: u8) -> Pos {
        debug_assert!(x < GRID_SIZE && y < GRID_SIZE);
        Pos(y * GRID_SIZE + x)
    }

    /// Column (0-5).
    #[inline]
    pub fn x(self) -> u8 {
        self.0 % GRID_SIZE
    }

    /// Row (0-5).
    #[inline]
    pub fn y(self) -> u8 {
        self.0 / GRID_SIZE
    }

    /// One step in the given direction, or `None` when the step leaves the
    /// grid.
    #[inline]
    pub fn step(self, direction: Direction) -> Option<Pos> {
        let (dx, dy) = direction.delta();
        let x = self.x() as i8 + dx;
        let y = self.y() as i8 + dy;
        if (0..GRID_SIZE as i8).contains(&x) && (0..GRID_SIZE as i8).contains(&y) {
            Some(Pos::from_xy(x as u8, y as u8))
        } else {
            None
        }
    }

    /// Manhattan distance to another position.
    #[inline]
    pub fn manhattan(self, other: Pos) -> u8 {
        self.x().abs_diff(other.x()) + self.y().abs_diff(other.y())
    }

    /// Iterate over all 36 positions.
    pub fn all() -> impl Iterator<Item = Pos> {
        (0..CELL_COUNT).map(Pos)
    }
}

// ============================================================================
// Cells and board
// ============================================================================

/// Static terrain of a cell.
///
/// `Wall` is virtual: [`Board::static_type_at`] reports it for out-of-grid
/// coordinates, and no stored cell ever carries it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum CellType {
    /// Plain walkable ground.
    Vine,
    /// Impassable for heroes; enemies cross freely.
    Gap,
    /// Fatal for heroes; enemies cross freely.
    Trap,
    /// Goal cell. The level is won when every hero stands on one.
    Beehive,
    /// Out-of-bounds marker, never stored.
    Wall,
}

/// Identity of a movable piece. Heroes are keyed by order (0 = Wappo,
/// >= 1 = friends); enemies live in their own order space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum PieceId {
    Hero(u8),
    Enemy(u8),
}

/// One board cell: static terrain plus the transient occupant, if any.
#[derive(Clone, Copy, Debug)]
pub struct Cell {
    pub static_type: CellType,
    pub occupant: Option<PieceId>,
}

/// The 6x6 board. Pure data container: lookups and occupant bookkeeping,
/// no movement rules.
#[derive(Clone, Debug)]
pub struct Board {
    cells: [Cell; CELL_COUNT as usize],
}

impl Board {
    /// Build a board from level data: every unlisted index is `Vine`.
    fn from_level(level: &Level) -> Board {
        let mut cells = [Cell {
            static_type: CellType::Vine,
            occupant: None,
        }; CELL_COUNT as usize];
        for &index in &level.gaps {
            cells[index as usize].static_type = CellType::Gap;
        }
        for &index in &level.traps {
            cells[index as usize].static_type = CellType::Trap;
        }
        for &index in &level.beehives {
            cells[index as usize].static_type = CellType::Beehive;
        }
        Board { cells }
    }

    /// The cell at the given position.
    #[inline]
    pub fn cell_at(&self, pos: Pos) -> &Cell {
        &self.cells[pos.0 as usize]
    }

    /// Static type at raw coordinates; `Wall` for anything off-grid.
    #[inline]
    pub fn static_type_at(&self, x: i8, y: i8) -> CellType {
        if (0..GRID_SIZE as i8).contains(&x) && (0..GRID_SIZE as i8).contains(&y) {
            self.cells[(y as u8 * GRID_SIZE + x as u8) as usize].static_type
        } else {
            CellType::Wall
        }
    }

    /// The occupant of a cell, if any.
    #[inline]
    pub fn occupant(&self, pos: Pos) -> Option<PieceId> {
        self.cells[pos.0 as usize].occupant
    }

    /// Record a piece on a cell.
    #[inline]
    pub fn place(&mut self, id: PieceId, pos: Pos) {
        self.cells[pos.0 as usize].occupant = Some(id);
    }

    /// Remove any occupant from a cell.
    #[inline]
    pub fn clear(&mut self, pos: Pos) {
        self.cells[pos.0 as usize].occupant = None;
    }
}

// ============================================================================
// Pieces
// ============================================================================

/// A hero piece: the player-steered Wappo (`order 0`) or a friend
/// (`order >= 1`).
#[derive(Clone, Copy, Debug)]
pub struct Hero {
    pub order: u8,
    /// Cell moves this hero performs per turn.
    pub step_count: u8,
    pub location: Pos,
    /// Attempted moves so far in the current turn; resets to 0 at the end of
    /// every fully-resolved turn. A piece is finished once
    /// `move_counter >= step_count`.
    pub move_counter: u8,
}

/// An enemy piece. `direction` is mutable game state: it changes on wall
/// bounces and, for diagonal enemies, before every attempt.
#[derive(Clone, Copy, Debug)]
pub struct Enemy {
    pub order: u8,
    pub axis: Axis,
    pub direction: Direction,
    pub step_count: u8,
    pub location: Pos,
    pub move_counter: u8,
}

// ============================================================================
// Level data
// ============================================================================

/// Pure-data description of a level, as loaded from JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
    pub id: u32,
    /// Par move count; doubles as the solver depth baseline.
    pub basescore: u32,
    #[serde(default)]
    pub gaps: Vec<u8>,
    #[serde(default)]
    pub traps: Vec<u8>,
    pub beehives: Vec<u8>,
    pub wappo_start: u8,
    #[serde(default)]
    pub friends: Vec<FriendSpec>,
    #[serde(default)]
    pub enemies: Vec<EnemySpec>,
}

/// Starting state of one friend hero.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FriendSpec {
    pub order: u8,
    pub step: u8,
    pub cell: u8,
}

/// Starting state of one enemy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EnemySpec {
    pub order: u8,
    pub axis: Axis,
    pub dir: Direction,
    pub step: u8,
    pub cell: u8,
}

/// Rejection reasons for malformed level data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("cell index {0} is outside the 6x6 grid")]
    CellOutOfRange(u8),
    #[error("cell {0} is declared as more than one terrain type")]
    TerrainOverlap(u8),
    #[error("duplicate {kind} order {order}")]
    DuplicateOrder { kind: &'static str, order: u8 },
    #[error("friend order 0 is reserved for Wappo")]
    ReservedOrder,
    #[error("step count {0} is not 1 or 2")]
    BadStepCount(u8),
    #[error("two pieces start on cell {0}")]
    PieceOverlap(u8),
    #[error("hero starts on impassable or fatal cell {0}")]
    HeroOnHazard(u8),
    #[error("level has no beehive cells")]
    NoBeehives,
    #[error("basescore must be positive")]
    ZeroBasescore,
}

impl Level {
    /// Check untrusted level data. The engine itself assumes a valid level;
    /// callers loading external files should validate first.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.basescore == 0 {
            return Err(LevelError::ZeroBasescore);
        }
        if self.beehives.is_empty() {
            return Err(LevelError::NoBeehives);
        }

        let mut terrain = [false; CELL_COUNT as usize];
        for &cell in self.gaps.iter().chain(&self.traps).chain(&self.beehives) {
            if cell >= CELL_COUNT {
                return Err(LevelError::CellOutOfRange(cell));
            }
            if terrain[cell as usize] {
                return Err(LevelError::TerrainOverlap(cell));
            }
            terrain[cell as usize] = true;
        }

        let hazard = |cell: u8| {
            self.gaps.contains(&cell) || self.traps.contains(&cell)
        };

        let mut occupied = [false; CELL_COUNT as usize];
        let mut claim = |cell: u8| -> Result<(), LevelError> {
            if cell >= CELL_COUNT {
                return Err(LevelError::CellOutOfRange(cell));
            }
            if occupied[cell as usize] {
                return Err(LevelError::PieceOverlap(cell));
            }
            occupied[cell as usize] = true;
            Ok(())
        };

        claim(self.wappo_start)?;
        if hazard(self.wappo_start) {
            return Err(LevelError::HeroOnHazard(self.wappo_start));
        }

        let mut friend_orders = [false; 256];
        for friend in &self.friends {
            if friend.order == WAPPO_ORDER {
                return Err(LevelError::ReservedOrder);
            }
            if friend_orders[friend.order as usize] {
                return Err(LevelError::DuplicateOrder {
                    kind: "friend",
                    order: friend.order,
                });
            }
            friend_orders[friend.order as usize] = true;
            if !(1..=2).contains(&friend.step) {
                return Err(LevelError::BadStepCount(friend.step));
            }
            claim(friend.cell)?;
            if hazard(friend.cell) {
                return Err(LevelError::HeroOnHazard(friend.cell));
            }
        }

        let mut enemy_orders = [false; 256];
        for enemy in &self.enemies {
            if enemy_orders[enemy.order as usize] {
                return Err(LevelError::DuplicateOrder {
                    kind: "enemy",
                    order: enemy.order,
                });
            }
            enemy_orders[enemy.order as usize] = true;
            if !(1..=2).contains(&enemy.step) {
                return Err(LevelError::BadStepCount(enemy.step));
            }
            claim(enemy.cell)?;
        }

        Ok(())
    }
}

// ============================================================================
// Turn results
// ============================================================================

/// Outcome of one simulated turn.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TurnOutcome {
    /// Every hero stands on a beehive. `score = 2 * basescore - moves_taken`.
    Won { score: i32 },
    /// A hero died.
    Lost,
    /// The turn resolved with nobody dead and the level not yet won.
    Continuing,
}

/// What happened to one piece within a move group.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EventKind {
    Moved(Pos),
    Blocked,
    Died,
}

/// One per-piece entry in a move group. `direction` is the piece's facing
/// after the attempt and is populated for enemies only, so a presentation
/// layer can orient sprites.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PieceEvent {
    pub piece: PieceId,
    pub event: EventKind,
    pub direction: Option<Direction>,
}

/// Events of one step round, batched so a presentation layer can animate the
/// round as a simultaneous group.
pub type MoveGroup = Vec<PieceEvent>;

/// Full report of one simulated turn: the outcome plus the ordered move
/// groups (hero phase first, then one group per friend round, then one per
/// enemy round).
#[derive(Clone, Debug)]
pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub groups: Vec<MoveGroup>,
}

/// Score with the display floor applied: losing more moves than the formula
/// allows still shows 1.
#[inline]
pub fn display_score(score: i32) -> i32 {
    score.max(1)
}

// ============================================================================
// Turn engine
// ============================================================================

/// Result of one movement attempt, internal to the phase loops.
enum StepOutcome {
    Moved(Pos),
    Blocked(BlockReason),
    Fatal { victim: PieceId },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockReason {
    /// Wall, or gap for a hero.
    Terrain,
    /// A piece of the blocking kind already occupies the target.
    Peer,
}

/// Per-round event accumulator. Later attempts by the same piece overwrite
/// earlier ones, so a friend that is blocked and then moves on a later tick
/// reports a single `Moved`.
struct RoundEvents {
    events: BTreeMap<PieceId, (EventKind, Option<Direction>)>,
}

impl RoundEvents {
    fn new() -> RoundEvents {
        RoundEvents {
            events: BTreeMap::new(),
        }
    }

    fn record(&mut self, piece: PieceId, event: EventKind, direction: Option<Direction>) {
        self.events.insert(piece, (event, direction));
    }

    fn into_group(self) -> MoveGroup {
        self.events
            .into_iter()
            .map(|(piece, (event, direction))| PieceEvent {
                piece,
                event,
                direction,
            })
            .collect()
    }
}

/// The turn engine. Owns the board and all pieces exclusively; a solver
/// never shares one engine between branches, it constructs or reloads a
/// fresh one per trial.
#[derive(Clone, Debug)]
pub struct Game {
    level: Level,
    board: Board,
    heroes: BTreeMap<u8, Hero>,
    enemies: BTreeMap<u8, Enemy>,
    moves_taken: u32,
}

impl Game {
    /// Build an engine at the level's starting positions.
    ///
    /// The level is assumed well-formed; run [`Level::validate`] on
    /// untrusted input first.
    pub fn new(level: &Level) -> Game {
        let mut game = Game {
            level: level.clone(),
            board: Board::from_level(level),
            heroes: BTreeMap::new(),
            enemies: BTreeMap::new(),
            moves_taken: 0,
        };
        game.populate();
        game
    }

    fn populate(&mut self) {
        self.board = Board::from_level(&self.level);
        self.heroes.clear();
        self.enemies.clear();

        let wappo = Hero {
            order: WAPPO_ORDER,
            step_count: 1,
            location: Pos(self.level.wappo_start),
            move_counter: 0,
        };
        self.board.place(PieceId::Hero(WAPPO_ORDER), wappo.location);
        self.heroes.insert(WAPPO_ORDER, wappo);

        for spec in &self.level.friends {
            let friend = Hero {
                order: spec.order,
                step_count: spec.step,
                location: Pos(spec.cell),
                move_counter: 0,
            };
            self.board.place(PieceId::Hero(spec.order), friend.location);
            self.heroes.insert(spec.order, friend);
        }

        for spec in &self.level.enemies {
            let enemy = Enemy {
                order: spec.order,
                axis: spec.axis,
                direction: spec.dir,
                step_count: spec.step,
                location: Pos(spec.cell),
                move_counter: 0,
            };
            self.board.place(PieceId::Enemy(spec.order), enemy.location);
            self.enemies.insert(spec.order, enemy);
        }
    }

    /// Rebuild the level's starting state and zero the move count.
    pub fn reset(&mut self) {
        self.populate();
        self.moves_taken = 0;
    }

    /// The level this engine was built from.
    pub fn level(&self) -> &Level {
        &self.level
    }

    /// The board, for read-only inspection.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The controllable hero.
    pub fn wappo(&self) -> &Hero {
        self.heroes.get(&WAPPO_ORDER).expect("Wappo always present")
    }

    /// A hero by order, if present.
    pub fn hero(&self, order: u8) -> Option<&Hero> {
        self.heroes.get(&order)
    }

    /// An enemy by order, if present.
    pub fn enemy(&self, order: u8) -> Option<&Enemy> {
        self.enemies.get(&order)
    }

    /// Turns simulated since construction or the last `reset`.
    pub fn moves_taken(&self) -> u32 {
        self.moves_taken
    }

    // ========== Turn phases ==========

    /// Resolve one full turn from a player direction input.
    ///
    /// The input must be cardinal; diagonal directions are never player
    /// moves.
    pub fn simulate_turn(&mut self, direction: Direction) -> TurnResult {
        debug_assert!(direction.is_cardinal(), "player input must be cardinal");
        self.moves_taken += 1;
        let mut groups: Vec<MoveGroup> = Vec::new();

        // Hero phase: Wappo alone, one attempt.
        let mut events = RoundEvents::new();
        match self.move_piece(PieceId::Hero(WAPPO_ORDER), direction) {
            StepOutcome::Moved(to) => {
                events.record(PieceId::Hero(WAPPO_ORDER), EventKind::Moved(to), None);
            }
            StepOutcome::Blocked(_) => {
                events.record(PieceId::Hero(WAPPO_ORDER), EventKind::Blocked, None);
            }
            StepOutcome::Fatal { victim } => {
                events.record(victim, EventKind::Died, None);
                groups.push(events.into_group());
                return TurnResult {
                    outcome: TurnOutcome::Lost,
                    groups,
                };
            }
        }
        groups.push(events.into_group());

        if self.run_friend_rounds(direction, &mut groups) {
            return TurnResult {
                outcome: TurnOutcome::Lost,
                groups,
            };
        }

        // The win check runs once, after the friend phase; enemy movement
        // can only lose the level, never win it.
        if self.all_heroes_on_beehives() {
            let score = 2 * self.level.basescore as i32 - self.moves_taken as i32;
            return TurnResult {
                outcome: TurnOutcome::Won { score },
                groups,
            };
        }

        if self.run_enemy_rounds(&mut groups) {
            return TurnResult {
                outcome: TurnOutcome::Lost,
                groups,
            };
        }

        self.reset_counters();
        TurnResult {
            outcome: TurnOutcome::Continuing,
            groups,
        }
    }

    /// Friend step rounds. Returns true when a friend died.
    fn run_friend_rounds(&mut self, direction: Direction, groups: &mut Vec<MoveGroup>) -> bool {
        let max_step = self
            .heroes
            .range(1..)
            .map(|(_, friend)| friend.step_count)
            .max()
            .unwrap_or(0);

        for round in 1..=max_step {
            let mut events = RoundEvents::new();
            for _tick in 0..TICK_CAP {
                let mut moved_any = false;
                let orders: Vec<u8> = self.heroes.range(1..).map(|(&order, _)| order).collect();
                for order in orders {
                    let (step_count, move_counter) = {
                        let friend = &self.heroes[&order];
                        (friend.step_count, friend.move_counter)
                    };
                    if step_count < round || move_counter >= round {
                        continue;
                    }
                    match self.move_piece(PieceId::Hero(order), direction) {
                        StepOutcome::Moved(to) => {
                            moved_any = true;
                            events.record(PieceId::Hero(order), EventKind::Moved(to), None);
                        }
                        StepOutcome::Blocked(_) => {
                            events.record(PieceId::Hero(order), EventKind::Blocked, None);
                        }
                        StepOutcome::Fatal { victim } => {
                            events.record(victim, EventKind::Died, None);
                            groups.push(events.into_group());
                            return true;
                        }
                    }
                }
                if !moved_any {
                    break;
                }
            }
            // A friend that never got to move still consumes the round.
            for (_, friend) in self.heroes.range_mut(1..) {
                if friend.step_count >= round && friend.move_counter < round {
                    friend.move_counter += 1;
                }
            }
            groups.push(events.into_group());
        }
        false
    }

    /// Enemy step rounds. Returns true when an enemy killed a hero.
    fn run_enemy_rounds(&mut self, groups: &mut Vec<MoveGroup>) -> bool {
        let max_step = self
            .enemies
            .values()
            .map(|enemy| enemy.step_count)
            .max()
            .unwrap_or(0);
        if max_step == 0 {
            return false;
        }

        // Deterministic phase order: axis first, then order.
        let mut phase_order: Vec<u8> = self.enemies.keys().copied().collect();
        phase_order.sort_by_key(|order| (self.enemies[order].axis, *order));

        for round in 1..=max_step {
            let mut events = RoundEvents::new();
            for _tick in 0..TICK_CAP {
                let mut moved_any = false;
                for &order in &phase_order {
                    let (step_count, move_counter, axis, location, direction) = {
                        let enemy = &self.enemies[&order];
                        (
                            enemy.step_count,
                            enemy.move_counter,
                            enemy.axis,
                            enemy.location,
                            enemy.direction,
                        )
                    };
                    if step_count < round || move_counter >= round {
                        continue;
                    }
                    // A diagonal enemy re-aims before every attempt, not
                    // only on wall hits.
                    let heading = if axis == Axis::Diagonal {
                        let heading = Self::diagonal_direction(location, direction);
                        self.enemies
                            .get_mut(&order)
                            .expect("enemy present")
                            .direction = heading;
                        heading
                    } else {
                        direction
                    };
                    let outcome = self.move_piece(PieceId::Enemy(order), heading);
                    let facing = self.enemies[&order].direction;
                    match outcome {
                        StepOutcome::Moved(to) => {
                            moved_any = true;
                            events.record(PieceId::Enemy(order), EventKind::Moved(to), Some(facing));
                        }
                        StepOutcome::Blocked(_) => {
                            events.record(PieceId::Enemy(order), EventKind::Blocked, Some(facing));
                        }
                        StepOutcome::Fatal { victim } => {
                            events.record(victim, EventKind::Died, None);
                            groups.push(events.into_group());
                            return true;
                        }
                    }
                }
                if !moved_any {
                    break;
                }
            }
            for enemy in self.enemies.values_mut() {
                if enemy.step_count >= round && enemy.move_counter < round {
                    enemy.move_counter += 1;
                }
            }
            groups.push(events.into_group());
        }
        false
    }

    // ========== Per-piece move resolution ==========

    /// Resolve a single movement attempt. Every phase funnels through here,
    /// so the blocking and fatality rules live in one place.
    fn move_piece(&mut self, id: PieceId, direction: Direction) -> StepOutcome {
        let from = self.location_of(id);
        let mut direction = direction;
        let mut target = from.step(direction);

        // An enemy headed off-grid re-turns before anything else. Only the
        // boundary is consulted here; the new heading may still be blocked
        // by occupancy, which is then an ordinary blocked move.
        if let PieceId::Enemy(order) = id {
            if target.is_none() {
                let enemy = self.enemies.get_mut(&order).expect("enemy present");
                direction = match enemy.axis {
                    Axis::Diagonal => Self::diagonal_direction(from, enemy.direction),
                    Axis::Horizontal | Axis::Vertical => enemy.direction.reversed(),
                };
                enemy.direction = direction;
                target = from.step(direction);
            }
        }

        let blocked = match target {
            None => Some(BlockReason::Terrain),
            Some(to) => {
                let cell = self.board.cell_at(to);
                match id {
                    PieceId::Hero(_) => {
                        if cell.static_type == CellType::Gap {
                            Some(BlockReason::Terrain)
                        } else if matches!(cell.occupant, Some(PieceId::Hero(_))) {
                            // Heroes block heroes; enemies do not block a
                            // hero, that case is fatal instead.
                            Some(BlockReason::Peer)
                        } else {
                            None
                        }
                    }
                    PieceId::Enemy(_) => {
                        if matches!(cell.occupant, Some(PieceId::Enemy(_))) {
                            Some(BlockReason::Peer)
                        } else {
                            None
                        }
                    }
                }
            }
        };

        if let Some(reason) = blocked {
            // A friend blocked by a fellow hero keeps its counter so it can
            // retry once the blocker clears within the same step round.
            let second_chance = reason == BlockReason::Peer
                && matches!(id, PieceId::Hero(order) if order != WAPPO_ORDER);
            if !second_chance {
                self.bump_counter(id);
            }
            return StepOutcome::Blocked(reason);
        }

        let to = target.expect("off-grid targets are blocked above");

        // Fatality is checked before relocation: a dying piece never moves.
        match id {
            PieceId::Hero(_) => {
                let deadly = self.board.cell_at(to).static_type == CellType::Trap
                    || matches!(self.board.occupant(to), Some(PieceId::Enemy(_)));
                if deadly {
                    return StepOutcome::Fatal { victim: id };
                }
            }
            PieceId::Enemy(_) => {
                if let Some(victim @ PieceId::Hero(_)) = self.board.occupant(to) {
                    return StepOutcome::Fatal { victim };
                }
            }
        }

        self.bump_counter(id);
        self.board.clear(from);
        self.board.place(id, to);
        self.set_location(id, to);
        StepOutcome::Moved(to)
    }

    /// Pick a heading for a diagonal enemy: the first of the priority
    /// candidates whose target cell is on the grid. Occupancy is never
    /// consulted.
    fn diagonal_direction(from: Pos, current: Direction) -> Direction {
        let candidates = match current {
            Direction::NorthEast => [
                Direction::NorthEast,
                Direction::SouthEast,
                Direction::NorthWest,
                Direction::SouthWest,
            ],
            Direction::SouthEast => [
                Direction::SouthEast,
                Direction::NorthEast,
                Direction::SouthWest,
                Direction::NorthWest,
            ],
            Direction::SouthWest => [
                Direction::SouthWest,
                Direction::NorthWest,
                Direction::SouthEast,
                Direction::NorthEast,
            ],
            Direction::NorthWest => [
                Direction::NorthWest,
                Direction::SouthWest,
                Direction::NorthEast,
                Direction::SouthEast,
            ],
            // A diagonal mover that somehow carries a cardinal heading
            // falls back to the north-east preference order.
            _ => [
                Direction::NorthEast,
                Direction::SouthEast,
                Direction::NorthWest,
                Direction::SouthWest,
            ],
        };
        candidates
            .into_iter()
            .find(|&candidate| from.step(candidate).is_some())
            .unwrap_or(current)
    }

    fn location_of(&self, id: PieceId) -> Pos {
        match id {
            PieceId::Hero(order) => self.heroes[&order].location,
            PieceId::Enemy(order) => self.enemies[&order].location,
        }
    }

    fn set_location(&mut self, id: PieceId, to: Pos) {
        match id {
            PieceId::Hero(order) => {
                self.heroes.get_mut(&order).expect("hero present").location = to;
            }
            PieceId::Enemy(order) => {
                self.enemies.get_mut(&order).expect("enemy present").location = to;
            }
        }
    }

    fn bump_counter(&mut self, id: PieceId) {
        match id {
            PieceId::Hero(order) => {
                self.heroes.get_mut(&order).expect("hero present").move_counter += 1;
            }
            PieceId::Enemy(order) => {
                self.enemies.get_mut(&order).expect("enemy present").move_counter += 1;
            }
        }
    }

    fn all_heroes_on_beehives(&self) -> bool {
        self.heroes
            .values()
            .all(|hero| self.board.cell_at(hero.location).static_type == CellType::Beehive)
    }

    fn reset_counters(&mut self) {
        for hero in self.heroes.values_mut() {
            hero.move_counter = 0;
        }
        for enemy in self.enemies.values_mut() {
            enemy.move_counter = 0;
        }
    }

    // ========== Snapshots ==========

    /// Capture the dynamic state: piece locations plus enemy directions.
    pub fn take_snapshot(&self) -> Snapshot {
        let friend_slots = self
            .heroes
            .keys()
            .next_back()
            .map(|&max| if max == WAPPO_ORDER { 0 } else { max as usize + 1 })
            .unwrap_or(0);
        let mut friends = vec![None; friend_slots];
        for (&order, friend) in self.heroes.range(1..) {
            friends[order as usize] = Some(friend.location);
        }

        let enemy_slots = self
            .enemies
            .keys()
            .next_back()
            .map(|&max| max as usize + 1)
            .unwrap_or(0);
        let mut enemies = vec![None; enemy_slots];
        for (&order, enemy) in &self.enemies {
            enemies[order as usize] = Some(EnemyState {
                location: enemy.location,
                direction: enemy.direction,
            });
        }

        Snapshot {
            wappo: self.wappo().location,
            friends,
            enemies,
        }
    }

    /// Place the level's pieces at snapshotted positions. The snapshot must
    /// come from an engine built on the same level. Move counters zero;
    /// `moves_taken` is left untouched (callers resuming a level track their
    /// own move count).
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) {
        self.board = Board::from_level(&self.level);

        {
            let wappo = self
                .heroes
                .get_mut(&WAPPO_ORDER)
                .expect("Wappo always present");
            wappo.location = snapshot.wappo;
            wappo.move_counter = 0;
        }
        self.board.place(PieceId::Hero(WAPPO_ORDER), snapshot.wappo);

        for (order, slot) in snapshot.friends.iter().enumerate() {
            if let Some(pos) = slot {
                let order = order as u8;
                let friend = self
                    .heroes
                    .get_mut(&order)
                    .expect("snapshot friend missing from level");
                friend.location = *pos;
                friend.move_counter = 0;
                self.board.place(PieceId::Hero(order), *pos);
            }
        }

        for (order, slot) in snapshot.enemies.iter().enumerate() {
            if let Some(state) = slot {
                let order = order as u8;
                let enemy = self
                    .enemies
                    .get_mut(&order)
                    .expect("snapshot enemy missing from level");
                enemy.location = state.location;
                enemy.direction = state.direction;
                enemy.move_counter = 0;
                self.board.place(PieceId::Enemy(order), state.location);
            }
        }
    }
}

// ============================================================================
// Snapshot codec
// ============================================================================

/// Location and facing of one enemy inside a snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct EnemyState {
    pub location: Pos,
    pub direction: Direction,
}

/// Serializable dynamic state: Wappo's cell, friend cells by order, enemy
/// cell/direction pairs by order. `None` slots mark absent orders.
///
/// The canonical string form (`Display` / `FromStr`) is total and injective,
/// which makes it usable both as a save format and as a search visited-set
/// key. Round-trip law: parsing a rendered snapshot yields an equal value.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Snapshot {
    pub wappo: Pos,
    pub friends: Vec<Option<Pos>>,
    pub enemies: Vec<Option<EnemyState>>,
}

/// Rejection reasons for malformed snapshot strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotParseError {
    #[error("expected three '|'-separated segments")]
    Segments,
    #[error("bad cell index: {0:?}")]
    BadCell(String),
    #[error("bad direction code: {0:?}")]
    BadDirection(String),
    #[error("bad enemy entry: {0:?}")]
    BadEnemyEntry(String),
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wappo.0)?;
        f.write_str("|")?;
        for (i, slot) in self.friends.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match slot {
                Some(pos) => write!(f, "{}", pos.0)?,
                None => f.write_str("-")?,
            }
        }
        f.write_str("|")?;
        for (i, slot) in self.enemies.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match slot {
                Some(state) => write!(f, "{}:{}", state.location.0, state.direction)?,
                None => f.write_str("-")?,
            }
        }
        Ok(())
    }
}

fn parse_cell(s: &str) -> Result<Pos, SnapshotParseError> {
    let index: u8 = s
        .parse()
        .map_err(|_| SnapshotParseError::BadCell(s.to_string()))?;
    if index >= CELL_COUNT {
        return Err(SnapshotParseError::BadCell(s.to_string()));
    }
    Ok(Pos(index))
}

impl FromStr for Snapshot {
    type Err = SnapshotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('|');
        let (Some(wappo), Some(friends), Some(enemies), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(SnapshotParseError::Segments);
        };

        let wappo = parse_cell(wappo)?;

        let friends = if friends.is_empty() {
            Vec::new()
        } else {
            friends
                .split(',')
                .map(|slot| {
                    if slot == "-" {
                        Ok(None)
                    } else {
                        parse_cell(slot).map(Some)
                    }
                })
                .collect::<Result<_, _>>()?
        };

        let enemies = if enemies.is_empty() {
            Vec::new()
        } else {
            enemies
                .split(',')
                .map(|slot| {
                    if slot == "-" {
                        return Ok(None);
                    }
                    let (cell, dir) = slot
                        .split_once(':')
                        .ok_or_else(|| SnapshotParseError::BadEnemyEntry(slot.to_string()))?;
                    Ok(Some(EnemyState {
                        location: parse_cell(cell)?,
                        direction: dir.parse()?,
                    }))
                })
                .collect::<Result<_, _>>()?
        };

        Ok(Snapshot {
            wappo,
            friends,
            enemies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_level(wappo_start: u8, beehives: Vec<u8>) -> Level {
        Level {
            id: 0,
            basescore: 5,
            gaps: vec![],
            traps: vec![],
            beehives,
            wappo_start,
            friends: vec![],
            enemies: vec![],
        }
    }

    #[test]
    fn test_direction_deltas_are_unit_vectors() {
        for direction in [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
            Direction::NorthEast,
            Direction::SouthEast,
            Direction::SouthWest,
            Direction::NorthWest,
        ] {
            let (dx, dy) = direction.delta();
            assert!(dx.abs() <= 1 && dy.abs() <= 1);
            assert!(dx != 0 || dy != 0);
            assert_eq!(direction.is_diagonal(), dx != 0 && dy != 0);
        }
    }

    #[test]
    fn test_direction_reversal_is_involutive() {
        for direction in [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
            Direction::NorthEast,
            Direction::SouthEast,
            Direction::SouthWest,
            Direction::NorthWest,
        ] {
            assert_eq!(direction.reversed().reversed(), direction);
            let (dx, dy) = direction.delta();
            let (rx, ry) = direction.reversed().delta();
            assert_eq!((dx, dy), (-rx, -ry));
        }
    }

    #[test]
    fn test_direction_code_round_trip() {
        for direction in [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
            Direction::NorthEast,
            Direction::SouthEast,
            Direction::SouthWest,
            Direction::NorthWest,
        ] {
            assert_eq!(direction.code().parse::<Direction>(), Ok(direction));
        }
        assert!("X".parse::<Direction>().is_err());
    }

    #[test]
    fn test_pos_xy_round_trip() {
        for pos in Pos::all() {
            assert_eq!(Pos::from_xy(pos.x(), pos.y()), pos);
        }
    }

    #[test]
    fn test_pos_step_off_grid() {
        assert_eq!(Pos(0).step(Direction::North), None);
        assert_eq!(Pos(0).step(Direction::West), None);
        assert_eq!(Pos(0).step(Direction::NorthWest), None);
        assert_eq!(Pos(0).step(Direction::SouthEast), Some(Pos(7)));
        assert_eq!(Pos(35).step(Direction::South), None);
        assert_eq!(Pos(35).step(Direction::East), None);
        assert_eq!(Pos(17).step(Direction::East), None);
        assert_eq!(Pos(17).step(Direction::West), Some(Pos(16)));
    }

    #[test]
    fn test_pos_manhattan() {
        assert_eq!(Pos(0).manhattan(Pos(35)), 10);
        assert_eq!(Pos(14).manhattan(Pos(14)), 0);
        assert_eq!(Pos(12).manhattan(Pos(15)), 3);
    }

    #[test]
    fn test_board_statics_from_level() {
        let mut level = bare_level(0, vec![35]);
        level.gaps = vec![7];
        level.traps = vec![8];
        let board = Board::from_level(&level);
        assert_eq!(board.cell_at(Pos(7)).static_type, CellType::Gap);
        assert_eq!(board.cell_at(Pos(8)).static_type, CellType::Trap);
        assert_eq!(board.cell_at(Pos(35)).static_type, CellType::Beehive);
        assert_eq!(board.cell_at(Pos(9)).static_type, CellType::Vine);
    }

    #[test]
    fn test_board_wall_off_grid() {
        let board = Board::from_level(&bare_level(0, vec![35]));
        assert_eq!(board.static_type_at(-1, 0), CellType::Wall);
        assert_eq!(board.static_type_at(0, -1), CellType::Wall);
        assert_eq!(board.static_type_at(6, 3), CellType::Wall);
        assert_eq!(board.static_type_at(3, 6), CellType::Wall);
        assert_eq!(board.static_type_at(0, 0), CellType::Vine);
    }

    #[test]
    fn test_board_place_clear() {
        let mut board = Board::from_level(&bare_level(0, vec![35]));
        board.place(PieceId::Enemy(2), Pos(10));
        assert_eq!(board.occupant(Pos(10)), Some(PieceId::Enemy(2)));
        board.clear(Pos(10));
        assert_eq!(board.occupant(Pos(10)), None);
    }

    #[test]
    fn test_level_validate_accepts_well_formed() {
        let mut level = bare_level(0, vec![35]);
        level.gaps = vec![14];
        level.traps = vec![21];
        level.friends = vec![FriendSpec {
            order: 1,
            step: 2,
            cell: 6,
        }];
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Horizontal,
            dir: Direction::East,
            step: 1,
            cell: 30,
        }];
        assert_eq!(level.validate(), Ok(()));
    }

    #[test]
    fn test_level_validate_rejections() {
        let mut level = bare_level(0, vec![36]);
        assert_eq!(level.validate(), Err(LevelError::CellOutOfRange(36)));

        level = bare_level(0, vec![35]);
        level.gaps = vec![35];
        assert_eq!(level.validate(), Err(LevelError::TerrainOverlap(35)));

        level = bare_level(0, vec![35]);
        level.basescore = 0;
        assert_eq!(level.validate(), Err(LevelError::ZeroBasescore));

        level = bare_level(0, vec![]);
        assert_eq!(level.validate(), Err(LevelError::NoBeehives));

        level = bare_level(0, vec![35]);
        level.friends = vec![FriendSpec {
            order: 0,
            step: 1,
            cell: 6,
        }];
        assert_eq!(level.validate(), Err(LevelError::ReservedOrder));

        level = bare_level(0, vec![35]);
        level.friends = vec![
            FriendSpec {
                order: 1,
                step: 1,
                cell: 6,
            },
            FriendSpec {
                order: 1,
                step: 1,
                cell: 7,
            },
        ];
        assert_eq!(
            level.validate(),
            Err(LevelError::DuplicateOrder {
                kind: "friend",
                order: 1
            })
        );

        level = bare_level(0, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Vertical,
            dir: Direction::North,
            step: 3,
            cell: 20,
        }];
        assert_eq!(level.validate(), Err(LevelError::BadStepCount(3)));

        level = bare_level(0, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Vertical,
            dir: Direction::North,
            step: 1,
            cell: 0,
        }];
        assert_eq!(level.validate(), Err(LevelError::PieceOverlap(0)));

        level = bare_level(0, vec![35]);
        level.traps = vec![0];
        assert_eq!(level.validate(), Err(LevelError::HeroOnHazard(0)));
    }

    #[test]
    fn test_level_json_round_trip() {
        let json = r#"{
            "id": 7, "basescore": 9,
            "gaps": [14], "traps": [21], "beehives": [35],
            "wappo_start": 0,
            "friends": [{ "order": 1, "step": 1, "cell": 6 }],
            "enemies": [{ "order": 0, "axis": "diagonal", "dir": "NE", "step": 2, "cell": 30 }]
        }"#;
        let level: Level = serde_json::from_str(json).unwrap();
        assert_eq!(level.validate(), Ok(()));
        assert_eq!(level.enemies[0].axis, Axis::Diagonal);
        assert_eq!(level.enemies[0].dir, Direction::NorthEast);

        let rendered = serde_json::to_string(&level).unwrap();
        let reparsed: Level = serde_json::from_str(&rendered).unwrap();
        assert_eq!(reparsed.enemies[0].dir, Direction::NorthEast);
        assert_eq!(reparsed.friends[0].cell, 6);
    }

    #[test]
    fn test_snapshot_string_round_trip() {
        let snapshot = Snapshot {
            wappo: Pos(14),
            friends: vec![None, Some(Pos(8))],
            enemies: vec![
                Some(EnemyState {
                    location: Pos(5),
                    direction: Direction::NorthEast,
                }),
                None,
                Some(EnemyState {
                    location: Pos(30),
                    direction: Direction::West,
                }),
            ],
        };
        let rendered = snapshot.to_string();
        assert_eq!(rendered, "14|-,8|5:NE,-,30:W");
        assert_eq!(rendered.parse::<Snapshot>(), Ok(snapshot));
    }

    #[test]
    fn test_snapshot_string_empty_segments() {
        let snapshot = Snapshot {
            wappo: Pos(0),
            friends: vec![],
            enemies: vec![],
        };
        assert_eq!(snapshot.to_string(), "0||");
        assert_eq!("0||".parse::<Snapshot>(), Ok(snapshot));
    }

    #[test]
    fn test_snapshot_parse_rejections() {
        assert_eq!("14|-".parse::<Snapshot>(), Err(SnapshotParseError::Segments));
        assert!(matches!(
            "99||".parse::<Snapshot>(),
            Err(SnapshotParseError::BadCell(_))
        ));
        assert!(matches!(
            "0||5:XX".parse::<Snapshot>(),
            Err(SnapshotParseError::BadDirection(_))
        ));
        assert!(matches!(
            "0||5".parse::<Snapshot>(),
            Err(SnapshotParseError::BadEnemyEntry(_))
        ));
    }

    #[test]
    fn test_wappo_moves_and_board_follows() {
        let mut game = Game::new(&bare_level(14, vec![35]));
        let result = game.simulate_turn(Direction::East);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.wappo().location, Pos(15));
        assert_eq!(game.board().occupant(Pos(15)), Some(PieceId::Hero(0)));
        assert_eq!(game.board().occupant(Pos(14)), None);
        assert_eq!(
            result.groups[0],
            vec![PieceEvent {
                piece: PieceId::Hero(0),
                event: EventKind::Moved(Pos(15)),
                direction: None,
            }]
        );
    }

    #[test]
    fn test_wappo_blocked_by_gap_and_wall() {
        let mut level = bare_level(14, vec![35]);
        level.gaps = vec![15];
        let mut game = Game::new(&level);

        let result = game.simulate_turn(Direction::East);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.wappo().location, Pos(14));
        assert_eq!(result.groups[0][0].event, EventKind::Blocked);

        let mut game = Game::new(&bare_level(0, vec![35]));
        let result = game.simulate_turn(Direction::North);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.wappo().location, Pos(0));
        assert_eq!(result.groups[0][0].event, EventKind::Blocked);
    }

    #[test]
    fn test_wappo_dies_on_trap_without_relocating() {
        let mut level = bare_level(14, vec![35]);
        level.traps = vec![15];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::East);
        assert_eq!(result.outcome, TurnOutcome::Lost);
        assert_eq!(game.wappo().location, Pos(14));
        assert_eq!(game.board().occupant(Pos(14)), Some(PieceId::Hero(0)));
        assert_eq!(result.groups[0][0].event, EventKind::Died);
    }

    #[test]
    fn test_wappo_dies_walking_into_enemy() {
        let mut level = bare_level(14, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Horizontal,
            dir: Direction::West,
            step: 1,
            cell: 15,
        }];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::East);
        assert_eq!(result.outcome, TurnOutcome::Lost);
        assert_eq!(game.wappo().location, Pos(14));
    }

    #[test]
    fn test_enemy_kills_hero_it_reaches() {
        let mut level = bare_level(14, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Horizontal,
            dir: Direction::West,
            step: 1,
            cell: 16,
        }];
        let mut game = Game::new(&level);
        // Wappo steps north out of range; the enemy then walks west into
        // Wappo's old neighbor and onward next turn.
        let result = game.simulate_turn(Direction::North);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.enemy(0).unwrap().location, Pos(15));

        // Wappo returns south onto 14; enemy moves to 14 and kills.
        let result = game.simulate_turn(Direction::South);
        assert_eq!(result.outcome, TurnOutcome::Lost);
        assert_eq!(game.enemy(0).unwrap().location, Pos(15));
        let last = result.groups.last().unwrap();
        assert!(last.contains(&PieceEvent {
            piece: PieceId::Hero(0),
            event: EventKind::Died,
            direction: None,
        }));
    }

    #[test]
    fn test_horizontal_enemy_bounces_off_wall() {
        let mut level = bare_level(0, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Horizontal,
            dir: Direction::East,
            step: 1,
            cell: 17,
        }];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::South);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        let enemy = game.enemy(0).unwrap();
        assert_eq!(enemy.direction, Direction::West);
        assert_eq!(enemy.location, Pos(16));
    }

    #[test]
    fn test_diagonal_enemy_reaims_out_of_corner() {
        let mut level = bare_level(35, vec![30]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Diagonal,
            dir: Direction::NorthWest,
            step: 1,
            cell: 0,
        }];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::North);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        let enemy = game.enemy(0).unwrap();
        assert_eq!(enemy.direction, Direction::SouthEast);
        assert_eq!(enemy.location, Pos(7));
    }

    #[test]
    fn test_enemy_blocked_by_enemy_not_by_hero_rules() {
        // Horizontal enemy (order 1) moves before the vertical one (order 0)
        // and takes the cell both are headed for.
        let mut level = bare_level(0, vec![35]);
        level.enemies = vec![
            EnemySpec {
                order: 0,
                axis: Axis::Vertical,
                dir: Direction::South,
                step: 1,
                cell: 14,
            },
            EnemySpec {
                order: 1,
                axis: Axis::Horizontal,
                dir: Direction::East,
                step: 1,
                cell: 19,
            },
        ];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::South);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.enemy(1).unwrap().location, Pos(20));
        assert_eq!(game.enemy(0).unwrap().location, Pos(14));
        assert_eq!(game.enemy(0).unwrap().direction, Direction::South);
    }

    #[test]
    fn test_two_step_enemy_moves_twice() {
        let mut level = bare_level(0, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Horizontal,
            dir: Direction::East,
            step: 2,
            cell: 12,
        }];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::South);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.enemy(0).unwrap().location, Pos(14));
        // Hero group plus two enemy round groups.
        assert_eq!(result.groups.len(), 3);
    }

    #[test]
    fn test_win_requires_every_hero_on_a_beehive() {
        let mut level = bare_level(6, vec![0, 13]);
        level.friends = vec![FriendSpec {
            order: 1,
            step: 1,
            cell: 25,
        }];
        level.basescore = 4;
        let mut game = Game::new(&level);

        // Both heroes step north: Wappo reaches its beehive, the friend
        // lands on plain vine, so the level is not yet won.
        let result = game.simulate_turn(Direction::North);
        assert_eq!(result.outcome, TurnOutcome::Continuing);

        // One more north: Wappo is wall-blocked on its beehive, the friend
        // reaches cell 13.
        let result = game.simulate_turn(Direction::North);
        assert_eq!(result.outcome, TurnOutcome::Won { score: 2 * 4 - 2 });
    }

    #[test]
    fn test_display_score_floor() {
        assert_eq!(display_score(5), 5);
        assert_eq!(display_score(0), 1);
        assert_eq!(display_score(-3), 1);
    }

    #[test]
    fn test_counters_reset_after_turn() {
        let mut level = bare_level(14, vec![35]);
        level.friends = vec![FriendSpec {
            order: 1,
            step: 2,
            cell: 0,
        }];
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Vertical,
            dir: Direction::South,
            step: 1,
            cell: 29,
        }];
        let mut game = Game::new(&level);
        let result = game.simulate_turn(Direction::East);
        assert_eq!(result.outcome, TurnOutcome::Continuing);
        assert_eq!(game.wappo().move_counter, 0);
        assert_eq!(game.hero(1).unwrap().move_counter, 0);
        assert_eq!(game.enemy(0).unwrap().move_counter, 0);
    }

    #[test]
    fn test_reset_restores_level_start() {
        let mut level = bare_level(14, vec![35]);
        level.enemies = vec![EnemySpec {
            order: 0,
            axis: Axis::Horizontal,
            dir: Direction::East,
            step: 1,
            cell: 30,
        }];
        let mut game = Game::new(&level);
        let initial = game.take_snapshot();
        game.simulate_turn(Direction::East);
        game.simulate_turn(Direction::North);
        assert_ne!(game.take_snapshot(), initial);
        game.reset();
        assert_eq!(game.take_snapshot(), initial);
        assert_eq!(game.moves_taken(), 0);
    }

    #[test]
    fn test_snapshot_load_round_trip() {
        let mut level = bare_level(14, vec![35]);
        level.friends = vec![FriendSpec {
            order: 2,
            step: 1,
            cell: 0,
        }];
        level.enemies = vec![EnemySpec {
            order: 1,
            axis: Axis::Diagonal,
            dir: Direction::NorthEast,
            step: 1,
            cell: 30,
        }];
        let mut game = Game::new(&level);
        game.simulate_turn(Direction::East);
        game.simulate_turn(Direction::East);
        let snapshot = game.take_snapshot();

        let mut restored = Game::new(&level);
        restored.load_snapshot(&snapshot);
        assert_eq!(restored.take_snapshot(), snapshot);
        assert_eq!(
            restored.board().occupant(snapshot.wappo),
            Some(PieceId::Hero(0))
        );
    }
}
