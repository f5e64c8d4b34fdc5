//! ASCII arena visualizer for terminal review.
//!
//! Draws the grid one character per cell: border and walls as `#`, trails
//! as `·`, heads as arrows and pickups as `$`. Large grids are sampled down
//! to fit the viewport.

use std::fmt::Write as _;

use lightcycle_core::agent::{AgentState, Rgb};
use lightcycle_core::math::{Direction, GridPos};
use lightcycle_core::simulation::Simulation;

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Maximum columns of the viewport.
    pub width: usize,
    /// Maximum rows of the viewport.
    pub height: usize,
    /// Show the leaderboard legend.
    pub show_legend: bool,
    /// Use colored output (24-bit ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 50,
            show_legend: true,
            use_color: true,
        }
    }
}

/// ANSI escape codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const YELLOW: &str = "\x1b[33m";
}

fn fg(color: Rgb) -> String {
    format!("\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
}

const fn head_char(dir: Direction) -> char {
    match dir {
        Direction::Up => '^',
        Direction::Right => '>',
        Direction::Down => 'v',
        Direction::Left => '<',
    }
}

#[derive(Clone)]
struct Cell {
    ch: char,
    color: Option<String>,
}

impl Cell {
    const fn plain(ch: char) -> Self {
        Self { ch, color: None }
    }
}

/// Render the arena as ASCII art.
#[must_use]
pub fn render_ascii(sim: &Simulation, title: &str, config: &AsciiConfig) -> String {
    let grid = sim.grid();
    let cols = usize::try_from(grid.cols()).unwrap_or(0);
    let rows = usize::try_from(grid.rows()).unwrap_or(0);
    let step = cols
        .div_ceil(config.width.max(1))
        .max(rows.div_ceil(config.height.max(1)))
        .max(1);

    let mut cells: Vec<Vec<Cell>> = (0..rows)
        .map(|y| {
            (0..cols)
                .map(|x| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    let pos = GridPos::new(x as i32, y as i32);
                    if pos.y < grid.safe_zone_rows() {
                        Cell::plain(' ')
                    } else if !grid.in_play(pos) {
                        Cell::plain('#')
                    } else if grid.is_occupied(pos) && grid.owner_at(pos).is_none() {
                        Cell::plain('#')
                    } else {
                        Cell::plain('.')
                    }
                })
                .collect()
        })
        .collect();

    let mut put = |pos: GridPos, cell: Cell| {
        if let (Ok(x), Ok(y)) = (usize::try_from(pos.x), usize::try_from(pos.y)) {
            if let Some(slot) = cells.get_mut(y).and_then(|row| row.get_mut(x)) {
                *slot = cell;
            }
        }
    };

    for item in sim.loot().items() {
        put(
            item.cell(),
            Cell {
                ch: '$',
                color: Some(colors::YELLOW.to_string()),
            },
        );
    }

    for agent in sim.agents() {
        let color = fg(agent.persona.color);
        let trail = if agent.state == AgentState::Erasing {
            ':'
        } else {
            '·'
        };
        for &pos in &agent.path {
            put(
                pos,
                Cell {
                    ch: trail,
                    color: Some(color.clone()),
                },
            );
        }
        if agent.is_alive() {
            put(
                agent.pos,
                Cell {
                    ch: head_char(agent.dir),
                    color: Some(format!("{}{color}", colors::BOLD)),
                },
            );
        }
    }

    let (bold, dim, reset) = if config.use_color {
        (colors::BOLD, colors::DIM, colors::RESET)
    } else {
        ("", "", "")
    };

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{bold}══ {title} │ Tick: {} │ Agents: {} │ Loot: {} ══{reset}",
        sim.get_tick(),
        sim.agents().iter().filter(|a| a.is_alive()).count(),
        sim.loot().items().len(),
    );

    for row in cells.iter().step_by(step) {
        for cell in row.iter().step_by(step) {
            match &cell.color {
                Some(color) if config.use_color => {
                    output.push_str(color);
                    output.push(cell.ch);
                    output.push_str(colors::RESET);
                }
                None if config.use_color && cell.ch == '#' => {
                    output.push_str(dim);
                    output.push('#');
                    output.push_str(reset);
                }
                _ => output.push(cell.ch),
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        output.push_str("── LEADERBOARD ──\n");
        for entry in lightcycle_core::snapshot::leaderboard(sim.agents()) {
            let (start, end) = if config.use_color {
                (fg(entry.color), colors::RESET.to_string())
            } else {
                (String::new(), String::new())
            };
            let _ = writeln!(output, "  {start}{:<10}{end} {:>6}", entry.name, entry.score);
        }
        output.push_str("  ^>v< head  · trail  : erasing  $ loot  # wall\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightcycle_core::config::TickContext;
    use lightcycle_test_utils::fixtures;

    fn plain() -> AsciiConfig {
        AsciiConfig {
            use_color: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_arena_has_border() {
        let config = fixtures::quiet_config();
        let sim = fixtures::empty_arena(&config, 1);
        let output = render_ascii(&sim, "empty", &plain());

        assert!(output.contains("empty"));
        assert!(output.contains("Tick: 0"));
        let grid_rows: Vec<&str> = output.lines().skip(1).take(30).collect();
        assert_eq!(grid_rows.len(), 30);
        assert!(grid_rows.iter().all(|row| row.chars().count() == 40));
        assert!(grid_rows[29].chars().all(|c| c == '#'));
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn test_agent_head_and_trail_drawn() {
        let config = fixtures::quiet_config();
        let (mut sim, _) = fixtures::solo_ai_arena(&config, 3);
        let ctx = TickContext::new(&config);
        for _ in 0..20 {
            sim.tick(&ctx);
        }

        let output = render_ascii(&sim, "solo", &plain());
        let grid_rows: Vec<&str> = output.lines().skip(1).take(30).collect();
        assert!(grid_rows.iter().any(|row| row.contains('·')));
        assert!(grid_rows.iter().any(|row| row.contains(['^', '>', 'v', '<'])));
        assert!(output.contains("LEADERBOARD"));
    }

    #[test]
    fn test_color_output_uses_persona_rgb() {
        let config = fixtures::quiet_config();
        let (mut sim, id) = fixtures::solo_ai_arena(&config, 3);
        sim.tick(&TickContext::new(&config));
        let color = sim.agent(id).unwrap().persona.color;

        let output = render_ascii(&sim, "color", &AsciiConfig::default());
        assert!(output.contains(&format!("38;2;{};{};{}m", color.r, color.g, color.b)));
    }

    #[test]
    fn test_large_grid_is_sampled() {
        let config = fixtures::quiet_config();
        let sim = lightcycle_core::simulation::Simulation::new(1600, 1000, &config, 1).unwrap();
        let small = AsciiConfig {
            width: 40,
            height: 25,
            show_legend: false,
            use_color: false,
        };
        let output = render_ascii(&sim, "big", &small);
        assert!(output.lines().skip(1).all(|row| row.chars().count() <= 40));
        assert!(output.lines().count() <= 26);
    }
}
