//! Integration tests for void_world streaming, ordering and visibility

use glam::Vec3;
use void_world::prelude::*;
use void_world::scene::chunk_eye;

const SIZE: f32 = 16.0;
const HOLE: ChunkCoordinate = ChunkCoordinate::new(2, 2);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Chunks (0..=10, 0..=10) except `HOLE`, each with terrain, a rock and a pebble
fn level() -> LevelDescription {
    let mut level = LevelDescription::new(SIZE)
        .with_material("grass")
        .with_material("stone");
    for z in 0..=10 {
        for x in 0..=10 {
            let coordinate = ChunkCoordinate::new(x, z);
            if coordinate == HOLE {
                continue;
            }
            level = level.with_chunk(
                ChunkDescription::new(coordinate)
                    .with_terrain(TerrainDescription::new("grass", 0.0, 2.0))
                    .with_model(ModelDescription::new(
                        format!("rock_{}_{}", x, z),
                        "stone",
                        Vec3::new(8.0, 1.0, 8.0),
                    ))
                    .with_model(ModelDescription::new(
                        format!("pebble_{}_{}", x, z),
                        "stone",
                        Vec3::new(2.0, 1.0, 3.0),
                    )),
            );
        }
    }
    level
}

fn camera_at(coordinate: ChunkCoordinate, height: f32) -> Camera {
    Camera::perspective(60.0, 1.0, 0.1, 1000.0)
        .with_position(chunk_eye(coordinate, SIZE, height))
        .with_forward(Vec3::X)
}

fn world_at(coordinate: ChunkCoordinate, config: WorldConfig) -> World {
    World::new(config, camera_at(coordinate, 2.0), LevelLoader::new(level()))
}

fn move_camera(world: &mut World, coordinate: ChunkCoordinate) {
    let height = world.camera().position().y;
    world
        .camera_mut()
        .set_position(chunk_eye(coordinate, SIZE, height));
}

fn coords(list: &[(i32, i32)]) -> Vec<ChunkCoordinate> {
    let mut coordinates: Vec<_> = list.iter().copied().map(ChunkCoordinate::from).collect();
    coordinates.sort();
    coordinates
}

fn assert_retention(world: &World, radius: u32) {
    let center = world.scene().camera_coordinate();
    let r2 = i64::from(radius * radius);

    for coordinate in world.scene().resident_coordinates() {
        assert!(
            coordinate.chebyshev_distance(center) <= radius + 1,
            "{} resident but too far from {}",
            coordinate,
            center
        );
    }
    for coordinate in world.loader().authored_coordinates() {
        if coordinate.distance_squared(center) <= r2 {
            assert!(
                world.scene().is_resident(coordinate),
                "{} authored within view of {} but not resident",
                coordinate,
                center
            );
        }
    }
}

#[test]
fn test_end_to_end_scenario() {
    init_logging();
    let mut world = world_at(ChunkCoordinate::ORIGIN, WorldConfig::default());
    let mut clock = FrameClock::new();

    assert!(world.init(&clock).is_loaded());
    assert_eq!(world.scene().resident_coordinates(), coords(&[(0, 0)]));

    clock.tick(1.0 / 60.0);
    let update = world.update(&clock).unwrap();
    assert!(update.full_scan);
    assert_eq!(
        world.scene().resident_coordinates(),
        coords(&[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (0, 2)])
    );
    assert_eq!(world.scene().num_loaded_chunks(), 6);
    assert_eq!(world.scene().static_index().len(), 12);

    move_camera(&mut world, ChunkCoordinate::new(5, 0));
    clock.tick(1.0 / 60.0);
    let update = world.update(&clock).unwrap();
    assert_eq!(update.center, ChunkCoordinate::new(5, 0));
    assert_eq!(update.loaded.len(), 9);
    assert_eq!(world.scene().current_chunk(), ChunkCoordinate::new(5, 0));

    // (2, 0) is 3 away and survives in the retain band
    assert_eq!(
        world.scene().resident_coordinates(),
        coords(&[
            (2, 0),
            (3, 0),
            (4, 0),
            (5, 0),
            (6, 0),
            (7, 0),
            (4, 1),
            (5, 1),
            (6, 1),
            (5, 2),
        ])
    );

    let origin = ChunkIndex::from(ChunkCoordinate::ORIGIN);
    assert!(update.unloaded.contains(&ChunkCoordinate::ORIGIN));
    assert!(world.scene().chunk(origin).is_none());
    assert_eq!(world.scene().static_index().group_len(origin), 0);
    assert!(world
        .scene()
        .query_static(&ChunkCoordinate::ORIGIN.footprint(SIZE))
        .is_empty());
    assert_eq!(world.scene().static_index().len(), 20);
}

#[test]
fn test_loading_resident_chunk_is_idempotent() {
    init_logging();
    let mut loader = LevelLoader::new(level());
    let mut scene = Scene::new(SIZE, camera_at(ChunkCoordinate::new(4, 4), 2.0));
    let clock = FrameClock::new();
    let coordinate = ChunkCoordinate::new(4, 4);

    assert!(loader.load_chunk(&mut scene, coordinate, &clock).is_loaded());
    let indexed = scene.static_index().len();
    let version = scene.static_index().version();

    let again = loader.load_chunk(&mut scene, coordinate, &clock);
    assert_eq!(again, LoadOutcome::AlreadyResident(ChunkIndex::from(coordinate)));
    assert_eq!(scene.num_loaded_chunks(), 1);
    assert_eq!(scene.static_index().len(), indexed);
    assert_eq!(scene.static_index().version(), version);
}

#[test]
fn test_hole_is_silently_skipped() {
    init_logging();
    let mut world = world_at(HOLE, WorldConfig::default());
    let clock = FrameClock::new();

    assert_eq!(world.init(&clock), LoadOutcome::NoContent);
    let update = world.update(&clock).unwrap();
    assert!(!world.scene().is_resident(HOLE));
    assert_eq!(update.skipped, 1);
    assert_eq!(world.scene().num_loaded_chunks(), 12);
    assert_eq!(world.manager().stats().no_content, 2);
}

#[test]
fn test_transparent_order_is_reverse_of_opaque() {
    init_logging();
    // High above, looking straight down over the whole resident area
    let camera = Camera::perspective(90.0, 1.0, 0.1, 1000.0)
        .with_position(chunk_eye(ChunkCoordinate::new(5, 5), SIZE, 200.0))
        .with_forward(Vec3::NEG_Y);
    let mut world = World::new(
        WorldConfig::default().with_view_radius(3),
        camera,
        LevelLoader::new(level()),
    );
    let clock = FrameClock::new();
    world.init(&clock);
    world.update(&clock);

    let scene = world.scene();
    let opaque = scene.chunk_draw_order().to_vec();
    let mut reversed = opaque.clone();
    reversed.reverse();
    assert_eq!(scene.transparent_draw_order(), reversed);

    // Permutation of the resident set, nearest first
    let mut resident: Vec<ChunkCoordinate> = opaque.iter().map(ChunkIndex::coordinate).collect();
    let eye = scene.camera().position();
    let distances: Vec<f32> = resident
        .iter()
        .map(|c| c.world_center(SIZE).distance_squared(eye))
        .collect();
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    resident.sort();
    assert_eq!(resident, scene.resident_coordinates());

    // Model traversal reverses too, within chunks as well
    let mut front_to_back = Vec::new();
    let mut back_to_front = Vec::new();
    let visited = scene.traverse_models(
        |model| front_to_back.push(model.name.clone()),
        |_| true,
        DrawOrder::FrontToBack,
        None,
    );
    scene.traverse_models(
        |model| back_to_front.push(model.name.clone()),
        |_| true,
        DrawOrder::BackToFront,
        None,
    );
    assert_eq!(visited, 2 * scene.num_loaded_chunks());
    back_to_front.reverse();
    assert_eq!(front_to_back, back_to_front);

    // Nearest rock first in the opaque pass
    assert_eq!(front_to_back[0], "rock_5_5");

    let instanced = scene.traverse_models(
        |_| {},
        |_| true,
        DrawOrder::FrontToBack,
        Some(ModelCategory::Instanced),
    );
    assert_eq!(instanced, 0);
}

#[test]
fn test_retention_law_along_a_path() {
    init_logging();
    let path = [
        (0, 0),
        (1, 0),
        (2, 0),
        (2, 1),
        (2, 2),
        (3, 3),
        (4, 3),
        (8, 3),
        (8, 4),
        (7, 5),
        (7, 6),
        (6, 6),
        (1, 9),
        (0, 9),
    ];

    let mut full = world_at(ChunkCoordinate::ORIGIN, WorldConfig::default());
    let mut hinted = world_at(
        ChunkCoordinate::ORIGIN,
        WorldConfig::default().with_scan_strategy(ChunkScanStrategy::DirectionHint),
    );
    let mut clock = FrameClock::new();
    full.init(&clock);
    hinted.init(&clock);

    for (x, z) in path {
        let coordinate = ChunkCoordinate::new(x, z);
        move_camera(&mut full, coordinate);
        move_camera(&mut hinted, coordinate);
        clock.tick(0.1);
        full.update(&clock);
        hinted.update(&clock);

        assert_retention(&full, 2);
        assert_retention(&hinted, 2);
        assert_eq!(
            full.scene().resident_coordinates(),
            hinted.scene().resident_coordinates(),
            "strategies disagree at {}",
            coordinate
        );
        assert_eq!(
            full.scene().static_index().len(),
            2 * full.scene().num_loaded_chunks()
        );
    }

    assert!(hinted.manager().stats().hinted_scans > 0);
    assert_eq!(full.manager().stats().hinted_scans, 0);
}

#[test]
fn test_visibility_flags_match_frustum() {
    init_logging();
    let mut world = world_at(ChunkCoordinate::new(5, 5), WorldConfig::default());
    let clock = FrameClock::new();
    world.init(&clock);
    world.update(&clock);

    let ahead = |world: &World| {
        world
            .scene()
            .chunk_at(ChunkCoordinate::new(7, 5))
            .map(|chunk| chunk.static_models()[0].is_visible())
    };
    let behind = |world: &World| {
        world
            .scene()
            .chunk_at(ChunkCoordinate::new(3, 5))
            .map(|chunk| chunk.static_models()[0].is_visible())
    };

    assert_eq!(ahead(&world), Some(true));
    assert_eq!(behind(&world), Some(false));

    let check_all = |world: &World| {
        let scene = world.scene();
        for coordinate in scene.resident_coordinates() {
            let chunk = scene.chunk_at(coordinate).unwrap();
            for model in chunk.static_models() {
                let direct = scene
                    .camera()
                    .frustum_collides(&BoundingVolume::Obb(*model.oriented_bounds()));
                assert_eq!(model.is_visible(), direct, "{}", model.name);
            }
        }
    };
    check_all(&world);

    // Turning around without changing chunks refreshes the flags
    world.camera_mut().set_forward(Vec3::NEG_X);
    assert!(world.update(&clock).is_none());
    assert_eq!(ahead(&world), Some(false));
    assert_eq!(behind(&world), Some(true));
    check_all(&world);
}

#[test]
fn test_current_chunk_is_never_rejected_whole() {
    init_logging();
    let mut level = level();
    if let Some(chunk) = level
        .chunks
        .iter_mut()
        .find(|chunk| chunk.coordinate == ChunkCoordinate::new(5, 5))
    {
        chunk.models.push(
            ModelDescription::new("beacon", "stone", Vec3::new(8.0, 1.0, 8.0)).with_cullable(false),
        );
    }

    // Above the ground, looking up: no chunk bounds reach the frustum
    let camera = Camera::perspective(60.0, 1.0, 0.1, 1000.0)
        .with_position(chunk_eye(ChunkCoordinate::new(5, 5), SIZE, 50.0))
        .with_forward(Vec3::Y);
    let mut world = World::new(WorldConfig::default(), camera, LevelLoader::new(level));
    let clock = FrameClock::new();
    world.init(&clock);
    world.update(&clock);

    let scene = world.scene();
    let current = scene.chunk(scene.current_index()).unwrap();
    assert!(!scene
        .camera()
        .frustum_collides(&BoundingVolume::Aabb(*current.culling_bounds())));

    let mut opaque = Vec::new();
    scene.traverse_models(
        |model| opaque.push(model.name.clone()),
        |_| true,
        DrawOrder::FrontToBack,
        None,
    );
    assert_eq!(opaque, vec!["beacon".to_string()]);

    let transparent = scene.traverse_models(|_| {}, |_| true, DrawOrder::BackToFront, None);
    assert_eq!(transparent, 0);
    assert_eq!(scene.draw_terrains(|_, _| {}, |_| true), 0);
}

#[test]
fn test_config_from_json_drives_world() {
    init_logging();
    let config = WorldConfig::from_json(r#"{ "view_radius": 1, "scan_strategy": "direction_hint" }"#)
        .unwrap();
    let mut world = world_at(ChunkCoordinate::new(5, 5), config);
    let clock = FrameClock::new();
    world.init(&clock);
    world.update(&clock);
    assert_eq!(world.scene().num_loaded_chunks(), 5);

    world.manager_mut().set_view_radius(2);
    let update = world.update(&clock).unwrap();
    assert!(update.full_scan);
    assert_eq!(update.loaded.len(), 8);
    assert_eq!(world.scene().num_loaded_chunks(), 13);
}

#[test]
fn test_visible_point_lights_follow_chunk_order() {
    init_logging();
    let mut level = level();
    for chunk in level.chunks.iter_mut() {
        chunk.lights.push(LightDescription::new(Vec3::new(8.0, 3.0, 8.0), 4.0));
    }
    let mut world = World::new(
        WorldConfig::default(),
        camera_at(ChunkCoordinate::new(5, 5), 2.0),
        LevelLoader::new(level),
    );
    let clock = FrameClock::new();
    world.init(&clock);
    world.update(&clock);

    let lights = world.scene().visible_point_lights();
    assert!(!lights.is_empty());
    // Facing +X: nothing from chunks behind the camera
    assert!(lights.iter().all(|light| light.position.x > 5.0 * SIZE));
    let eye = world.camera().position();
    let distances: Vec<f32> = lights.iter().map(|l| l.position.distance_squared(eye)).collect();
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
}
