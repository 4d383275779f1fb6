//! Headless demo: surfaces a random atom cloud and logs progress.
//!
//! Usage: `molsurf [EDGE] [ATOMS] [OPTIONS.toml]`

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use molsurf::molecule::{Atom, AtomSlots};
use molsurf::options::Options;
use molsurf::scene::SceneGraph;
use molsurf::surface::{
    ColorScheme, PropertyMap, SphereShellExtractor, SurfaceManager,
    SurfaceRequest, SurfaceStyle, SurfaceType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use web_time::Instant;

const ELEMENTS: [&str; 4] = ["C", "N", "O", "S"];

fn parse_arg<T: std::str::FromStr>(index: usize, default: T) -> Result<T, String> {
    match std::env::args().nth(index) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("argument {index} is not a number: {raw}")),
        None => Ok(default),
    }
}

fn random_cloud(edge: f32, count: usize) -> AtomSlots {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            let position = Vec3::new(
                rng.random_range(0.0..=edge),
                rng.random_range(0.0..=edge),
                rng.random_range(0.0..=edge),
            );
            let element = ELEMENTS[rng.random_range(0..ELEMENTS.len())];
            Atom::new(position, element)
                .with_color([0.7, 0.7, 0.7])
                .with_property("b", rng.random_range(0.0..100.0))
        })
        .collect()
}

fn run() -> Result<(), String> {
    let edge: f32 = parse_arg(1, 100.0)?;
    let count: usize = parse_arg(2, 2000)?;
    let options = match std::env::args().nth(3) {
        Some(path) => Options::load(std::path::Path::new(&path)).map_err(|e| e.to_string())?,
        None => Options::default(),
    };

    let extractor = Arc::new(SphereShellExtractor::from_options(&options.surface));
    let mut manager = SurfaceManager::new(&options, extractor).map_err(|e| e.to_string())?;
    let (mut scene, layout) = SceneGraph::with_default_layout(&options.lighting);

    let mut atoms = random_cloud(edge, count);
    let all = atoms.all_indices();
    let focus: Vec<usize> = all.iter().copied().take(count / 10).collect();
    let style = SurfaceStyle {
        opacity: Some(0.85),
        map: Some(PropertyMap {
            prop: "b".to_owned(),
            scheme: ColorScheme::default(),
        }),
        ..SurfaceStyle::default()
    };

    let start = Instant::now();
    let id = manager.add_surface(
        &mut atoms,
        &SurfaceRequest::new(SurfaceType::Sas, &all, &all)
            .with_style(style)
            .with_focus(&focus),
    );
    log::info!("{id} requested over {count} atoms in a {edge}^3 box");

    let deadline = start + Duration::from_secs(120);
    loop {
        let _ = manager.pump_wait(Duration::from_millis(50));
        let swapped = manager.reconcile(&mut scene, layout.model_group);
        let delta = scene.take_delta();
        let Some(stats) = manager.stats(id) else {
            return Err(format!("{id} disappeared"));
        };
        if swapped > 0 {
            log::info!(
                "{}/{} chunks, {} vertices (+{} -{} nodes)",
                stats.jobs_done,
                stats.jobs_total,
                stats.vertices,
                delta.added.len(),
                delta.removed.len(),
            );
        }
        if stats.finished {
            break;
        }
        let settled = stats.jobs_done + stats.failed == stats.jobs_total;
        if stats.failed > 0 && settled && manager.outstanding() == 0 {
            log::error!("{id} stalled with {} failed chunks", stats.failed);
            break;
        }
        if Instant::now() >= deadline {
            return Err(format!("{id} did not finish in time"));
        }
    }

    if let Some(stats) = manager.stats(id) {
        let json = serde_json::to_string(&stats).map_err(|e| e.to_string())?;
        log::info!(
            "finished in {:.1}ms: {json}",
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    manager.clear(&mut scene);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
