//! Kin Runtime
//!
//! Boots an engine with a small gravity scene and runs it for a number of
//! updates.
//!
//! Usage: `kin [UPDATES] [SETTINGS.json]`

use anyhow::{Context, Result};
use kin_core::define_component;
use kin_core::ecs::{
    for_each_entity, ComponentDomain, Engine, EngineConfig, EngineError, EntityProcessor,
    FamilyWatcher,
};
use kin_core::settings::EngineSettings;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

const DEFAULT_UPDATES: u32 = 10;
const GROUND: i32 = -5;

#[derive(Debug, Default)]
struct Positioned {
    y: i32,
}
define_component!(Positioned);

#[derive(Debug, Default)]
struct Falling;
define_component!(Falling);

fn build_engine(settings: EngineSettings) -> Result<Engine> {
    let domain = ComponentDomain::builder()
        .register_default::<Positioned>()
        .register_pooled::<Falling>()
        .build()?;

    let gravity = EntityProcessor::new(
        "gravity",
        domain.family_with::<Positioned>()?.with::<Falling>()?,
        |engine: &Engine, entity| {
            let Some(mut position) = engine.mapper::<Positioned>()?.get_mut(entity) else {
                return Ok(());
            };
            position.y -= 1;
            if position.y <= GROUND {
                engine.mapper::<Falling>()?.remove(entity);
            }
            Ok(())
        },
    );

    let landings = FamilyWatcher::new(
        "landings",
        domain.family_with::<Positioned>()?.without::<Falling>()?,
        for_each_entity(|engine: &Engine, entity| {
            let y = engine
                .mapper::<Positioned>()?
                .try_get(entity)?
                .map(|position| position.y)
                .ok_or_else(|| EngineError::service("landings", format!("{entity} lost its position")))?;
            tracing::info!(%entity, y, "entity at rest");
            Ok(())
        }),
        |_: &Engine, _| Ok(()),
    );

    let engine = Engine::new(
        EngineConfig::new(Rc::clone(&domain))
            .with_settings(settings)
            .with_service(gravity)
            .with_service(landings),
    )?;
    Ok(engine)
}

fn populate(engine: &Engine) -> Result<()> {
    let positioned = engine.mapper::<Positioned>()?;
    let falling = engine.mapper::<Falling>()?;

    for height in 0..3 {
        let entity = engine.create_entity();
        positioned.create(entity)?.y = height;
        falling.create(entity)?;
    }
    let anchor = engine.create_entity();
    positioned.create(anchor)?;
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Kin v{}", kin_core::VERSION);

    let mut args = std::env::args().skip(1);
    let updates = match args.next() {
        Some(arg) => arg
            .parse::<u32>()
            .with_context(|| format!("invalid update count '{arg}'"))?,
        None => DEFAULT_UPDATES,
    };
    let settings = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings from {path}"))?;
            EngineSettings::from_json(&text)?
        }
        None => EngineSettings::default(),
    };

    let engine = build_engine(settings)?;
    populate(&engine)?;

    for _ in 0..updates {
        engine.update()?;
    }

    let metrics = engine.metrics();
    let (min_ms, max_ms) = metrics.updates().range_ms();
    tracing::info!(
        updates,
        entities = engine.entities().entities().len(),
        avg_ms = metrics.updates().average_ms(),
        min_ms,
        max_ms,
        "run complete"
    );
    for (name, count) in metrics.counters().iter() {
        tracing::info!(counter = name, count, "metric");
    }
    for (service, total) in metrics.services().iter() {
        tracing::info!(service, total_us = total.as_micros() as u64, "service time");
    }

    Ok(())
}
