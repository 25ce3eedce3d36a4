//! Four search strategies over the Wappo state space.
//!
//! Every strategy shares the same skeleton: the move alphabet is the four
//! cardinal directions, each single-move trial loads a fresh engine from the
//! parent snapshot (engines are never shared between branches), and the
//! canonical snapshot string keys all visited bookkeeping. A trial that
//! reaches a win ends the search immediately.
//!
//! Depth budgets derive from the level's basescore:
//! - breadth-first: `2 * basescore` (shortest path within the cap)
//! - memoized depth-first: `3000 * basescore` (first solution found)
//! - pure backtracking: exactly `basescore`
//! - A*: unbounded (the heuristic carries the pruning)
//!
//! `max_depth`, when supplied, overrides the default cap for any strategy.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use wappo_core::{Direction, Game, Level, LevelError, Pos, Snapshot, TurnOutcome};

use crate::stats::SolveStats;

/// Search strategy selector.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Algorithm {
    /// Queue-based breadth-first search; shortest winning path.
    Bfs,
    /// Depth-first with a globally shared visited set. Terminates on deep
    /// levels at the cost of completeness: a state reachable only through an
    /// already-visited node is never re-explored.
    DfsMemo,
    /// Depth-first with no visited set at all; may revisit states freely
    /// within its tight depth budget.
    Backtracking,
    /// Best-first on `f = g + h` with a Manhattan-distance heuristic.
    AStar,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Bfs => "bfs",
            Algorithm::DfsMemo => "dfs",
            Algorithm::Backtracking => "backtracking",
            Algorithm::AStar => "astar",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bfs" => Ok(Algorithm::Bfs),
            "dfs" => Ok(Algorithm::DfsMemo),
            "backtracking" | "backtrack" => Ok(Algorithm::Backtracking),
            "astar" | "a*" => Ok(Algorithm::AStar),
            _ => Err(format!("unknown algorithm: {s:?}")),
        }
    }
}

/// Knobs for one solve call.
#[derive(Clone, Debug)]
pub struct SolveOptions {
    pub algorithm: Algorithm,
    /// Start from this state instead of the level's initial positions.
    pub initial_snapshot: Option<Snapshot>,
    /// Override the strategy's default depth cap.
    pub max_depth: Option<u32>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Bfs,
            initial_snapshot: None,
            max_depth: None,
        }
    }
}

/// Result of a finished (not interrupted) solve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub solved: bool,
    /// The winning move sequence when solved. For pure backtracking an
    /// unsolved result carries the longest explored losing path instead,
    /// which callers can surface as "abandoned at move N".
    pub path: Option<Vec<Direction>>,
    pub algorithm: Algorithm,
}

/// Failures that are not ordinary search exhaustion. Exhaustion reports
/// `Solution { solved: false }`, never an error.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("invalid level: {0}")]
    Level(#[from] LevelError),
    #[error("search interrupted")]
    Interrupted,
}

const BFS_CAP_FACTOR: u32 = 2;
const DFS_CAP_FACTOR: u32 = 3000;

/// One pending node of an iterative depth-first exploration.
struct Frame {
    snapshot: Snapshot,
    dir_idx: usize,
}

/// A* open-list entry, ordered by `f` with a FIFO tiebreak.
struct OpenEntry {
    f: u32,
    seq: u64,
    g: u32,
    key: String,
    snapshot: Snapshot,
    path: Vec<Direction>,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.f.cmp(&other.f).then_with(|| self.seq.cmp(&other.seq))
    }
}

/// State-space solver. One instance accumulates stats across a single solve
/// call; construct fresh per level.
pub struct Solver {
    pub stats: SolveStats,
    /// Progress log interval in seconds; `None` keeps the solver silent.
    pub log_interval_secs: Option<u64>,
}

impl Solver {
    pub fn new() -> Self {
        Self {
            stats: SolveStats::new(),
            log_interval_secs: None,
        }
    }

    /// Search the level for a winning move sequence.
    ///
    /// `running` is polled between trials; flipping it false makes the solve
    /// return [`SolveError::Interrupted`] instead of grinding out its depth
    /// budget.
    pub fn solve(
        &mut self,
        level: &Level,
        options: &SolveOptions,
        running: &AtomicBool,
    ) -> Result<Solution, SolveError> {
        level.validate()?;
        let start = match &options.initial_snapshot {
            Some(snapshot) => snapshot.clone(),
            None => Game::new(level).take_snapshot(),
        };
        match options.algorithm {
            Algorithm::Bfs => {
                let cap = options.max_depth.unwrap_or(BFS_CAP_FACTOR * level.basescore);
                self.bfs(level, &start, cap, running)
            }
            Algorithm::DfsMemo => {
                let cap = options.max_depth.unwrap_or(DFS_CAP_FACTOR * level.basescore);
                self.dfs_memo(level, &start, cap, running)
            }
            Algorithm::Backtracking => {
                let cap = options.max_depth.unwrap_or(level.basescore);
                self.backtracking(level, &start, cap, running)
            }
            Algorithm::AStar => {
                let cap = options.max_depth.unwrap_or(u32::MAX);
                self.astar(level, &start, cap, running)
            }
        }
    }

    /// Simulate a single move on a fresh engine loaded from `snapshot`.
    fn trial(
        &mut self,
        level: &Level,
        snapshot: &Snapshot,
        direction: Direction,
    ) -> (TurnOutcome, Snapshot) {
        self.stats.trials += 1;
        let mut game = Game::new(level);
        game.load_snapshot(snapshot);
        let outcome = game.simulate_turn(direction).outcome;
        if outcome == TurnOutcome::Lost {
            self.stats.losses += 1;
        }
        (outcome, game.take_snapshot())
    }

    /// Interrupt and progress-log checkpoint, run once per expansion.
    fn poll(&mut self, running: &AtomicBool, visited: usize) -> Result<(), SolveError> {
        if !running.load(Ordering::SeqCst) {
            return Err(SolveError::Interrupted);
        }
        if let Some(interval) = self.log_interval_secs {
            if self.stats.should_log(interval) {
                self.stats.log_progress(visited);
            }
        }
        Ok(())
    }

    fn found(algorithm: Algorithm, path: Vec<Direction>) -> Solution {
        Solution {
            solved: true,
            path: Some(path),
            algorithm,
        }
    }

    fn bfs(
        &mut self,
        level: &Level,
        start: &Snapshot,
        cap: u32,
        running: &AtomicBool,
    ) -> Result<Solution, SolveError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(Snapshot, Vec<Direction>)> = VecDeque::new();
        visited.insert(start.to_string());
        queue.push_back((start.clone(), Vec::new()));

        while let Some((snapshot, path)) = queue.pop_front() {
            self.poll(running, visited.len())?;
            self.stats.expanded += 1;
            self.stats.observe_depth(path.len());
            if path.len() as u32 >= cap {
                continue;
            }
            for direction in Direction::CARDINALS {
                let (outcome, child) = self.trial(level, &snapshot, direction);
                match outcome {
                    TurnOutcome::Won { .. } => {
                        let mut path = path;
                        path.push(direction);
                        return Ok(Self::found(Algorithm::Bfs, path));
                    }
                    TurnOutcome::Lost => {}
                    TurnOutcome::Continuing => {
                        if visited.insert(child.to_string()) {
                            let mut next = path.clone();
                            next.push(direction);
                            queue.push_back((child, next));
                        } else {
                            self.stats.revisits += 1;
                        }
                    }
                }
            }
        }
        Ok(Solution {
            solved: false,
            path: None,
            algorithm: Algorithm::Bfs,
        })
    }

    fn dfs_memo(
        &mut self,
        level: &Level,
        start: &Snapshot,
        cap: u32,
        running: &AtomicBool,
    ) -> Result<Solution, SolveError> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut stack = vec![Frame {
            snapshot: start.clone(),
            dir_idx: 0,
        }];
        let mut path: Vec<Direction> = Vec::new();

        while let Some(frame) = stack.last_mut() {
            if frame.dir_idx == Direction::CARDINALS.len() {
                stack.pop();
                path.pop();
                continue;
            }
            let direction = Direction::CARDINALS[frame.dir_idx];
            frame.dir_idx += 1;
            let snapshot = frame.snapshot.clone();

            self.poll(running, visited.len())?;
            let (outcome, child) = self.trial(level, &snapshot, direction);
            match outcome {
                TurnOutcome::Won { .. } => {
                    path.push(direction);
                    return Ok(Self::found(Algorithm::DfsMemo, path));
                }
                TurnOutcome::Lost => {}
                TurnOutcome::Continuing => {
                    if path.len() as u32 + 1 > cap {
                        continue;
                    }
                    // Once visited, never re-explored, even when a later
                    // branch could reach the state by a different route.
                    if visited.insert(child.to_string()) {
                        self.stats.expanded += 1;
                        path.push(direction);
                        self.stats.observe_depth(path.len());
                        stack.push(Frame {
                            snapshot: child,
                            dir_idx: 0,
                        });
                    } else {
                        self.stats.revisits += 1;
                    }
                }
            }
        }
        Ok(Solution {
            solved: false,
            path: None,
            algorithm: Algorithm::DfsMemo,
        })
    }

    fn backtracking(
        &mut self,
        level: &Level,
        start: &Snapshot,
        cap: u32,
        running: &AtomicBool,
    ) -> Result<Solution, SolveError> {
        let mut stack = vec![Frame {
            snapshot: start.clone(),
            dir_idx: 0,
        }];
        let mut path: Vec<Direction> = Vec::new();
        let mut longest_failed: Vec<Direction> = Vec::new();

        while let Some(frame) = stack.last_mut() {
            // Depth budget spent: this line is abandoned. Strictly-longer
            // replacement keeps the first of equally long failed lines.
            if frame.dir_idx == 0 && path.len() as u32 >= cap {
                if path.len() > longest_failed.len() {
                    longest_failed = path.clone();
                }
                stack.pop();
                path.pop();
                continue;
            }
            if frame.dir_idx == Direction::CARDINALS.len() {
                stack.pop();
                path.pop();
                continue;
            }
            let direction = Direction::CARDINALS[frame.dir_idx];
            frame.dir_idx += 1;
            let snapshot = frame.snapshot.clone();

            self.poll(running, stack.len())?;
            let (outcome, child) = self.trial(level, &snapshot, direction);
            match outcome {
                TurnOutcome::Won { .. } => {
                    path.push(direction);
                    return Ok(Self::found(Algorithm::Backtracking, path));
                }
                TurnOutcome::Lost => {
                    if path.len() + 1 > longest_failed.len() {
                        longest_failed = path.clone();
                        longest_failed.push(direction);
                    }
                }
                TurnOutcome::Continuing => {
                    self.stats.expanded += 1;
                    path.push(direction);
                    self.stats.observe_depth(path.len());
                    stack.push(Frame {
                        snapshot: child,
                        dir_idx: 0,
                    });
                }
            }
        }
        Ok(Solution {
            solved: false,
            path: if longest_failed.is_empty() {
                None
            } else {
                Some(longest_failed)
            },
            algorithm: Algorithm::Backtracking,
        })
    }

    fn astar(
        &mut self,
        level: &Level,
        start: &Snapshot,
        cap: u32,
        running: &AtomicBool,
    ) -> Result<Solution, SolveError> {
        let beehives: Vec<Pos> = level.beehives.iter().map(|&cell| Pos(cell)).collect();
        let mut open: BinaryHeap<Reverse<OpenEntry>> = BinaryHeap::new();
        let mut best_g: HashMap<String, u32> = HashMap::new();
        let mut seq = 0u64;

        let start_key = start.to_string();
        best_g.insert(start_key.clone(), 0);
        open.push(Reverse(OpenEntry {
            f: heuristic(start, &beehives),
            seq,
            g: 0,
            key: start_key,
            snapshot: start.clone(),
            path: Vec::new(),
        }));

        while let Some(Reverse(entry)) = open.pop() {
            self.poll(running, best_g.len())?;
            // Stale entry: a cheaper route to this state was recorded after
            // this one was pushed.
            if best_g.get(&entry.key).map_or(false, |&g| g < entry.g) {
                self.stats.revisits += 1;
                continue;
            }
            self.stats.expanded += 1;
            self.stats.observe_depth(entry.g as usize);
            if entry.g >= cap {
                continue;
            }
            for direction in Direction::CARDINALS {
                let (outcome, child) = self.trial(level, &entry.snapshot, direction);
                match outcome {
                    TurnOutcome::Won { .. } => {
                        let mut path = entry.path;
                        path.push(direction);
                        return Ok(Self::found(Algorithm::AStar, path));
                    }
                    TurnOutcome::Lost => {}
                    TurnOutcome::Continuing => {
                        let g = entry.g + 1;
                        let key = child.to_string();
                        // States reopen when a cheaper path turns up.
                        let better = best_g.get(&key).map_or(true, |&old| g < old);
                        if better {
                            best_g.insert(key.clone(), g);
                            seq += 1;
                            let mut next = entry.path.clone();
                            next.push(direction);
                            open.push(Reverse(OpenEntry {
                                f: g + heuristic(&child, &beehives),
                                seq,
                                g,
                                key,
                                snapshot: child,
                                path: next,
                            }));
                        } else {
                            self.stats.revisits += 1;
                        }
                    }
                }
            }
        }
        Ok(Solution {
            solved: false,
            path: None,
            algorithm: Algorithm::AStar,
        })
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum over every present hero of the Manhattan distance to its nearest
/// beehive. Ignores obstacles, so it never overestimates the true move
/// count: admissible and consistent under unit move cost.
fn heuristic(snapshot: &Snapshot, beehives: &[Pos]) -> u32 {
    let nearest = |pos: Pos| {
        beehives
            .iter()
            .map(|&beehive| pos.manhattan(beehive) as u32)
            .min()
            .unwrap_or(0)
    };
    let mut h = nearest(snapshot.wappo);
    for slot in &snapshot.friends {
        if let Some(pos) = slot {
            h += nearest(*pos);
        }
    }
    h
}
