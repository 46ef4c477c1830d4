/// Integration tests for sibling ordering against PostgreSQL
///
/// Run with: cargo test --test ordering_tests -- --ignored

mod common;

use chalk_shared::db::ordering::Placement;
use chalk_shared::error::{Entity, StoreError};
use chalk_shared::models::block::{Block, BlockContent};
use chalk_shared::models::lesson::Lesson;
use chalk_shared::models::module::Module;
use common::{create_course, create_lesson, test_pool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::PgPool;
use uuid::Uuid;

async fn module_names(pool: &PgPool, course_id: Uuid) -> Vec<String> {
    Module::list_by_course(pool, course_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect()
}

async fn module_indices(pool: &PgPool, course_id: Uuid) -> Vec<i32> {
    Module::list_by_course(pool, course_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.order_idx)
        .collect()
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_append_and_move_last_to_second() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        ids.push(Module::create(&pool, course.id, name, None).await.unwrap().id);
    }
    assert_eq!(module_indices(&pool, course.id).await, vec![1, 2, 3, 4]);

    let placement = Module::move_to(&pool, ids[3], 2).await.unwrap();

    assert_eq!(
        placement,
        Placement {
            parent_id: course.id,
            from: 4,
            to: 2
        }
    );
    assert_eq!(module_names(&pool, course.id).await, vec!["A", "D", "B", "C"]);
    assert_eq!(module_indices(&pool, course.id).await, vec![1, 2, 3, 4]);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_insert_at_front_shifts_everything() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    Module::create(&pool, course.id, "A", None).await.unwrap();
    Module::create(&pool, course.id, "B", None).await.unwrap();
    let new = Module::create(&pool, course.id, "New", Some(1)).await.unwrap();

    assert_eq!(new.order_idx, 1);
    assert_eq!(module_names(&pool, course.id).await, vec!["New", "A", "B"]);
    assert_eq!(module_indices(&pool, course.id).await, vec![1, 2, 3]);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_delete_compacted_renumbers_in_one_step() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    let a = Module::create(&pool, course.id, "A", None).await.unwrap();
    Module::create(&pool, course.id, "B", None).await.unwrap();
    Module::create(&pool, course.id, "C", None).await.unwrap();

    let renumbered = Module::delete_compacted(&pool, a.id).await.unwrap();

    assert_eq!(renumbered, 2);
    assert_eq!(module_names(&pool, course.id).await, vec!["B", "C"]);
    assert_eq!(module_indices(&pool, course.id).await, vec![1, 2]);

    let err = Module::delete_compacted(&pool, a.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Module)));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_out_of_range_requests_are_clamped() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    let a = Module::create(&pool, course.id, "A", Some(50)).await.unwrap();
    assert_eq!(a.order_idx, 1);
    let b = Module::create(&pool, course.id, "B", Some(-3)).await.unwrap();
    assert_eq!(b.order_idx, 1);

    let placement = Module::move_to(&pool, b.id, 99).await.unwrap();
    assert_eq!(placement.to, 2);
    assert_eq!(module_names(&pool, course.id).await, vec!["A", "B"]);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_move_to_current_position_changes_nothing() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    Module::create(&pool, course.id, "A", None).await.unwrap();
    let b = Module::create(&pool, course.id, "B", None).await.unwrap();
    Module::create(&pool, course.id, "C", None).await.unwrap();

    let placement = Module::move_to(&pool, b.id, 2).await.unwrap();

    assert_eq!(placement.from, placement.to);
    assert_eq!(module_names(&pool, course.id).await, vec!["A", "B", "C"]);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_missing_parent_and_item() {
    let pool = test_pool().await;

    let err = Module::create(&pool, Uuid::new_v4(), "Orphan", None).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Course)));

    let err = Lesson::create(&pool, Uuid::new_v4(), "Orphan", Some(1)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Module)));

    let err = Module::move_to(&pool, Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Module)));

    let err = Block::delete(&pool, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Block)));

    let err = Lesson::list_by_module(&pool, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(Entity::Module)));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_delete_leaves_gap_until_compacted() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    Module::create(&pool, course.id, "A", None).await.unwrap();
    let b = Module::create(&pool, course.id, "B", None).await.unwrap();
    Module::create(&pool, course.id, "C", None).await.unwrap();

    Module::delete(&pool, b.id).await.unwrap();
    assert_eq!(module_indices(&pool, course.id).await, vec![1, 3]);

    // Appending after a gap continues from the maximum
    let d = Module::create(&pool, course.id, "D", None).await.unwrap();
    assert_eq!(d.order_idx, 4);

    let renumbered = Module::compact(&pool, course.id).await.unwrap();
    assert_eq!(renumbered, 2);
    assert_eq!(module_names(&pool, course.id).await, vec!["A", "C", "D"]);
    assert_eq!(module_indices(&pool, course.id).await, vec![1, 2, 3]);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_random_operations_keep_blocks_dense() {
    let pool = test_pool().await;
    let lesson = create_lesson(&pool).await;
    let mut rng = StdRng::seed_from_u64(7);
    let mut ids: Vec<Uuid> = Vec::new();

    for step in 0..60 {
        if ids.is_empty() || rng.gen_bool(0.5) {
            let requested = if rng.gen_bool(0.3) {
                None
            } else {
                Some(rng.gen_range(0..=ids.len() as i32 + 2))
            };
            let block = Block::create(
                &pool,
                lesson.id,
                BlockContent::Text {
                    content: format!("step {step}"),
                },
                requested,
            )
            .await
            .unwrap();
            ids.push(block.id);
        } else {
            let id = ids[rng.gen_range(0..ids.len())];
            let requested = rng.gen_range(-1..=ids.len() as i32 + 2);
            Block::move_to(&pool, id, requested).await.unwrap();
        }

        let indices: Vec<i32> = Block::list_by_lesson(&pool, lesson.id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.order_idx)
            .collect();
        let expected: Vec<i32> = (1..=ids.len() as i32).collect();
        assert_eq!(indices, expected, "not dense after step {step}");
    }
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL instance
async fn test_concurrent_moves_in_one_scope_stay_dense() {
    let pool = test_pool().await;
    let (_, _, course) = create_course(&pool).await;

    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D", "E", "F"] {
        ids.push(Module::create(&pool, course.id, name, None).await.unwrap().id);
    }

    let mut tasks = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let pool = pool.clone();
        let id = *id;
        let target = (6 - i) as i32;
        tasks.push(tokio::spawn(async move { Module::move_to(&pool, id, target).await }));
    }
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) | Err(StoreError::OrderConflict) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(module_indices(&pool, course.id).await, vec![1, 2, 3, 4, 5, 6]);
}
