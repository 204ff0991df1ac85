//! Avatar example: a small character sheet driven by a stat container
//!
//! This example demonstrates:
//! - Keyed registration and resource stats (health capped by max health)
//! - Flat and percent modifiers, including cross-stat scaling
//! - Batched notifications flushed once per frame by `tick_all`
//! - Breakdowns, freezing and rejected cycles

use statbind::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Attr {
    Strength,
    Attack,
    MaxHp,
    Hp,
}

fn main() -> Result<(), StatError> {
    println!("=== Avatar Demo ===\n");

    let mut stats =
        StatContainer::with_config(GraphConfig::default().with_notify_mode(NotifyMode::Batched));

    // ===== Registration =====
    println!("1. Registration\n");

    let strength = stats.register(Attr::Strength, 12.0);
    let attack = stats.register(Attr::Attack, 20.0);
    let max_hp = stats.register(Attr::MaxHp, 2000.0);
    let hp = stats.register_resource(Attr::Hp, 2000.0, &Attr::MaxHp)?;

    for (attr, value) in stats.snapshot() {
        println!("{attr:?} = {value}");
    }

    // ===== Modifiers =====
    println!("\n2. Gear and scaling\n");

    let graph = stats.graph_mut();
    let max_hp_base = graph.base_of(max_hp)?;
    let armor = graph.create_modifier(ModifierDef::flat(100.0))?;
    let vigor = graph.create_modifier(ModifierDef::percent(0.1, max_hp_base))?;
    graph.add_modifier(max_hp, armor)?;
    graph.add_modifier(max_hp, vigor)?;
    println!("MaxHp = 2000 + 100 (armor) + 10% of base = {}", graph.value(max_hp)?);

    // attack gains 2 per point of strength
    let might = graph.create_modifier(ModifierDef::percent(2.0, strength))?;
    graph.add_modifier(attack, might)?;
    println!("Attack = 20 + 2 * Strength = {}", graph.value(attack)?);

    // ===== Batched notifications =====
    println!("\n3. Notifications\n");

    graph.subscribe(attack, |value| println!("  [ui] attack is now {value}"))?;
    graph.set_base_value(strength, 13.0)?;
    graph.set_base_value(strength, 15.0)?;
    println!("Strength raised twice, flushing once per frame:");
    let flushed = stats.tick_all();
    println!("{flushed} stat(s) notified");

    // ===== Resources =====
    println!("\n4. Health\n");

    let graph = stats.graph_mut();
    graph.set_stat_value(hp, 9999.0)?;
    println!("Overheal to 9999 is capped: Hp = {}", graph.value(hp)?);
    graph.set_stat_value(hp, -10.0)?;
    println!("Overkill to -10 is floored: Hp = {}", graph.value(hp)?);

    // ===== Breakdown =====
    println!("\n5. Breakdown of MaxHp\n");

    let breakdown = graph.breakdown(max_hp)?;
    println!("{breakdown:#?}");

    // ===== Cycles =====
    println!("\n6. Cycles are rejected\n");

    match graph.set_upper_bound(max_hp, hp, true) {
        Ok(()) => println!("unexpected: cycle accepted"),
        Err(err) => println!("Error: {err}"),
    }

    // ===== Freeze =====
    println!("\n7. Freeze\n");

    stats.freeze_all()?;
    let graph = stats.graph();
    println!(
        "MaxHp base = {}, modifiers = {}",
        graph.base_value(max_hp)?,
        graph.modifiers(max_hp)?.len()
    );

    Ok(())
}
