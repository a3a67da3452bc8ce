//! ASCII battle view for quick terminal review.
//!
//! One character per cell. Attacker units are uppercase, defender units
//! lowercase, both using the first letter of the model id. Buildings draw
//! `B` (defensive) or `H` (civilian) over their whole footprint.

use std::fmt::Write as _;

use battle_core::prelude::*;

/// ASCII rendering configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Maximum columns drawn (cells beyond are cropped).
    pub width: usize,
    /// Maximum rows drawn.
    pub height: usize,
    /// Show the unit count legend.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 40,
            show_legend: true,
            use_color: false,
        }
    }
}

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const BLUE: &str = "\x1b[34m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GRAY: &str = "\x1b[90m";
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    ch: char,
    color: &'static str,
}

impl Glyph {
    const fn plain(ch: char) -> Self {
        Self { ch, color: "" }
    }
}

fn side_color(battle: &GroundBattle, owner: PlayerId) -> &'static str {
    if owner == battle.attacker().id {
        colors::RED
    } else {
        colors::BLUE
    }
}

fn unit_glyph(battle: &GroundBattle, unit: &Unit) -> Glyph {
    let base = unit.model.id.chars().next().unwrap_or('u');
    let ch = if unit.owner == battle.attacker().id {
        base.to_ascii_uppercase()
    } else {
        base.to_ascii_lowercase()
    };
    let color = if unit.paralyzed > 0 {
        colors::YELLOW
    } else {
        side_color(battle, unit.owner)
    };
    Glyph { ch, color }
}

/// Render the battle as ASCII art.
#[must_use]
pub fn render_ascii(battle: &GroundBattle, config: &AsciiConfig) -> String {
    let terrain = battle.planet().terrain();
    let width = (terrain.width() as usize).min(config.width);
    let height = (terrain.height() as usize).min(config.height);

    let mut grid: Vec<Vec<Glyph>> = (0..height)
        .map(|y| {
            (0..width)
                .map(|x| {
                    if terrain.is_buildable(Location::new(x as i32, y as i32)) {
                        Glyph::plain('.')
                    } else {
                        Glyph {
                            ch: '#',
                            color: colors::GRAY,
                        }
                    }
                })
                .collect()
        })
        .collect();

    let mut put = |cell: Location, glyph: Glyph| {
        if cell.x >= 0 && cell.y >= 0 {
            if let Some(slot) = grid
                .get_mut(cell.y as usize)
                .and_then(|row| row.get_mut(cell.x as usize))
            {
                *slot = glyph;
            }
        }
    };

    for building in battle.planet().buildings() {
        let ch = match (building.kind, building.complete) {
            (BuildingKind::Defensive, true) => 'B',
            (BuildingKind::Defensive, false) => 'b',
            (BuildingKind::Civilian, true) => 'H',
            (BuildingKind::Civilian, false) => 'h',
        };
        let color = side_color(battle, building.owner);
        for cell in building.cells() {
            put(cell, Glyph { ch, color });
        }
    }
    for mine in battle.mines() {
        put(mine.location, Glyph::plain('+'));
    }
    for unit in battle.units().iter().filter(|u| u.is_alive()) {
        put(unit.cell(), unit_glyph(battle, unit));
    }
    for rocket in battle.rockets() {
        put(
            rocket.position.nearest_cell(),
            Glyph {
                ch: '!',
                color: colors::YELLOW,
            },
        );
    }
    for explosion in battle.explosions() {
        put(
            explosion.position.nearest_cell(),
            Glyph {
                ch: '*',
                color: colors::YELLOW,
            },
        );
    }

    let mut output = String::new();
    let (bold, reset) = if config.use_color {
        (colors::BOLD, colors::RESET)
    } else {
        ("", "")
    };
    let _ = writeln!(
        output,
        "{bold}== {} | tick {} =={reset}",
        battle.planet().name(),
        battle.tick()
    );
    for row in &grid {
        for glyph in row {
            if config.use_color && !glyph.color.is_empty() {
                output.push_str(glyph.color);
                output.push(glyph.ch);
                output.push_str(colors::RESET);
            } else {
                output.push(glyph.ch);
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        for player in [battle.attacker().id, battle.defender().id] {
            let (units, damaged) = battle.live_units_of(player).fold((0, 0), |(n, d), u| {
                (n + 1, d + usize::from(u.hp < u.model.hp))
            });
            let buildings = battle
                .planet()
                .buildings()
                .filter(|b| b.owner == player)
                .count();
            let _ = writeln!(
                output,
                "{player}: {units} units ({damaged} damaged), {buildings} buildings"
            );
        }
        if let Some(winner) = battle.winner() {
            let _ = writeln!(output, "winner: {winner}");
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_test_utils::fixtures::{BattleBuilder, ATTACKER, DEFENDER};

    fn plain() -> AsciiConfig {
        AsciiConfig {
            use_color: false,
            ..AsciiConfig::default()
        }
    }

    #[test]
    fn test_render_places_units_and_buildings() {
        let battle = BattleBuilder::new()
            .with_rows(&["......", "..#...", "......", "......"])
            .with_building("bunker", (3, 2))
            .with_unit(ATTACKER, "tank", (0, 0))
            .with_unit(DEFENDER, "paralyzer", (5, 0))
            .build();
        let text = render_ascii(&battle, &plain());
        let rows: Vec<&str> = text.lines().collect();
        assert!(rows[0].contains("tick 0"));
        assert_eq!(rows[1], "T....p");
        assert_eq!(rows[2], "..#...");
        assert_eq!(rows[3], "...BB.");
        assert_eq!(rows[4], "...BB.");
        assert!(rows[5].starts_with("player#1: 1 units"));
        assert!(rows[6].contains("1 buildings"));
    }

    #[test]
    fn test_render_crops_to_viewport() {
        let battle = BattleBuilder::new()
            .with_unit(ATTACKER, "tank", (1, 1))
            .build();
        let config = AsciiConfig {
            width: 10,
            height: 5,
            show_legend: false,
            use_color: false,
        };
        let text = render_ascii(&battle, &config);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.len() == 10));
    }

    #[test]
    fn test_render_colors_when_asked() {
        let battle = BattleBuilder::new()
            .with_unit(ATTACKER, "tank", (1, 1))
            .build();
        let config = AsciiConfig {
            use_color: true,
            ..AsciiConfig::default()
        };
        assert!(render_ascii(&battle, &config).contains(colors::RED));
    }
}
