use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sampling attempts per token before the last candidate is accepted as-is
pub const MAX_ATTEMPTS: u32 = 100;

/// Fixed token geometry, in board units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub token_size: u32,
    pub padding: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            token_size: 40,
            padding: 30,
        }
    }
}

/// The placement surface. Dimensions change on resize, geometry does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub width: u32,
    pub height: u32,
    pub geometry: Geometry,
}

impl Board {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_geometry(width, height, Geometry::default())
    }

    pub fn with_geometry(width: u32, height: u32, geometry: Geometry) -> Self {
        Self {
            width,
            height,
            geometry,
        }
    }

    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            geometry: self.geometry,
        }
    }

    /// Inclusive placement range on the x axis. `max < min` on tiny boards.
    pub fn x_range(&self) -> (i32, i32) {
        self.axis_range(self.width)
    }

    /// Inclusive placement range on the y axis. `max < min` on tiny boards.
    pub fn y_range(&self) -> (i32, i32) {
        self.axis_range(self.height)
    }

    fn axis_range(&self, dimension: u32) -> (i32, i32) {
        let Geometry {
            token_size,
            padding,
        } = self.geometry;
        let min = padding as i64;
        let max = dimension as i64 - token_size as i64 - padding as i64;
        (clamp_i32(min), clamp_i32(max))
    }

    /// Minimum centre-to-centre distance between two tokens
    pub fn min_separation(&self) -> f64 {
        (self.geometry.token_size + self.geometry.padding) as f64
    }

    /// Whether a position respects the padding on every side
    pub fn contains(&self, position: Position) -> bool {
        let (min_x, max_x) = self.x_range();
        let (min_y, max_y) = self.y_range();
        (min_x..=max_x).contains(&position.x) && (min_y..=max_y).contains(&position.y)
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Top-left offset of a token within the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Visibility {
    Visible,
    Fading,
    Hidden,
}

/// One clickable unit; `id` defines the required click order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub id: u32,
    pub position: Position,
    pub visibility: Visibility,
}

impl Token {
    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

/// A generated token together with how hard it was to place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub token: Token,
    pub attempts: u32,
    /// The attempt cap was hit and the accepted candidate still overlaps
    pub capped: bool,
}

/// Lay out `count` tokens with ids `1..=count` at random, mutually separated
/// positions. Tokens are placed in id order and only checked against tokens
/// already placed in this call.
pub fn generate<R: Rng + ?Sized>(count: u32, board: &Board, rng: &mut R) -> Vec<Token> {
    generate_placements(count, board, rng)
        .into_iter()
        .map(|p| p.token)
        .collect()
}

pub fn generate_placements<R: Rng + ?Sized>(
    count: u32,
    board: &Board,
    rng: &mut R,
) -> Vec<Placement> {
    let (min_x, max_x) = board.x_range();
    let (min_y, max_y) = board.y_range();
    let separation = board.min_separation();

    let mut placements: Vec<Placement> = Vec::with_capacity(count as usize);

    for id in 1..=count {
        let mut attempts = 0;
        let (candidate, overlapping) = loop {
            attempts += 1;
            let candidate = Position::new(
                sample_axis(rng, min_x, max_x),
                sample_axis(rng, min_y, max_y),
            );
            let overlapping = placements
                .iter()
                .any(|p| p.token.position.distance(&candidate) < separation);

            if !overlapping || attempts >= MAX_ATTEMPTS {
                break (candidate, overlapping);
            }
        };

        if overlapping {
            tracing::warn!(id, attempts, "placement attempt cap reached, accepting overlap");
        }

        placements.push(Placement {
            token: Token {
                id,
                position: candidate,
                visibility: Visibility::Visible,
            },
            attempts,
            capped: overlapping,
        });
    }

    placements
}

// An inverted range collapses to its lower bound instead of panicking.
fn sample_axis<R: Rng + ?Sized>(rng: &mut R, min: i32, max: i32) -> i32 {
    if max <= min {
        min
    } else {
        rng.gen_range(min..=max)
    }
}

/// Id of the topmost non-hidden token covering `(x, y)`. Higher ids are drawn
/// above lower ones.
pub fn hit_test(tokens: &[Token], token_size: u32, x: i32, y: i32) -> Option<u32> {
    let size = token_size as i32;
    tokens
        .iter()
        .rev()
        .filter(|t| t.visibility != Visibility::Hidden)
        .find(|t| {
            let p = t.position;
            x >= p.x && x < p.x + size && y >= p.y && y < p.y + size
        })
        .map(|t| t.id)
}
