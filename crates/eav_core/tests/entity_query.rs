use eav_core::db::open_db_in_memory;
use eav_core::{
    AttributeRepository, Entity, EntityListQuery, EntityOrderColumn, EntityRepository,
    SortDirection, SqliteEntityRepository, ValidationError,
};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

#[test]
fn find_by_attribute_is_scoped_to_entity_type() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let user = repo
        .create_with_attributes("user", &string_map(&[("email", "a@x.com")]))
        .unwrap();

    let found = repo
        .find_by_attribute("user", "email", "a@x.com")
        .unwrap()
        .unwrap();
    assert_eq!(found, user);
    assert!(repo
        .find_by_attribute("order", "email", "a@x.com")
        .unwrap()
        .is_none());
}

#[test]
fn find_by_attribute_ignores_other_types_sharing_the_pair() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let order = repo
        .create_with_attributes("order", &string_map(&[("email", "a@x.com")]))
        .unwrap();
    let user = repo
        .create_with_attributes("user", &string_map(&[("email", "a@x.com")]))
        .unwrap();

    assert_eq!(
        repo.find_by_attribute("user", "email", "a@x.com")
            .unwrap()
            .unwrap()
            .id,
        user.id
    );
    assert_eq!(
        repo.find_by_attribute("order", "email", "a@x.com")
            .unwrap()
            .unwrap()
            .id,
        order.id
    );
}

#[test]
fn find_by_attribute_requires_exact_key_and_value() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    repo.create_with_attributes("user", &string_map(&[("email", "a@x.com")]))
        .unwrap();

    assert!(repo
        .find_by_attribute("user", "email", "A@X.COM")
        .unwrap()
        .is_none());
    assert!(repo
        .find_by_attribute("user", "mail", "a@x.com")
        .unwrap()
        .is_none());
}

#[test]
fn find_by_attribute_reflects_later_upserts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let user = repo
        .create_with_attributes("user", &string_map(&[("email", "old@x.com")]))
        .unwrap();

    repo.attributes()
        .upsert(&user.id, "email", "new@x.com")
        .unwrap();

    assert!(repo
        .find_by_attribute("user", "email", "old@x.com")
        .unwrap()
        .is_none());
    assert_eq!(
        repo.find_by_attribute("user", "email", "new@x.com")
            .unwrap()
            .unwrap()
            .id,
        user.id
    );
}

#[test]
fn attribute_lookups_skip_deleted_entities() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let deleted = repo
        .create_with_attributes("user", &string_map(&[("plan", "pro")]))
        .unwrap();
    let kept = repo
        .create_with_attributes("user", &string_map(&[("plan", "pro")]))
        .unwrap();
    repo.delete(&deleted.id).unwrap();

    let listed = repo.list_by_attribute("user", "plan", "pro").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept.id);
    assert_eq!(
        repo.find_by_attribute("user", "plan", "pro")
            .unwrap()
            .unwrap()
            .id,
        kept.id
    );
}

#[test]
fn list_by_attribute_returns_all_matches_of_the_type_only() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let first = repo
        .create_with_attributes("user", &string_map(&[("plan", "pro")]))
        .unwrap();
    let second = repo
        .create_with_attributes("user", &string_map(&[("plan", "pro")]))
        .unwrap();
    repo.create_with_attributes("user", &string_map(&[("plan", "free")]))
        .unwrap();
    repo.create_with_attributes("team", &string_map(&[("plan", "pro")]))
        .unwrap();

    let ids: HashSet<String> = repo
        .list_by_attribute("user", "plan", "pro")
        .unwrap()
        .into_iter()
        .map(|entity| entity.id)
        .collect();
    assert_eq!(ids, HashSet::from([first.id, second.id]));
    assert!(repo
        .list_by_attribute("user", "plan", "enterprise")
        .unwrap()
        .is_empty());
}

#[test]
fn list_returns_oldest_page_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let users = create_users_with_reversed_age(&conn, &repo, 5);
    repo.create("order").unwrap();

    let query = EntityListQuery {
        kind: "user".to_string(),
        offset: 0,
        per_page: 2,
        search: None,
        order_by: EntityOrderColumn::from_str("created_at").unwrap(),
        direction: SortDirection::from_str("asc").unwrap(),
    };
    let page = repo.list(&query).unwrap();

    assert_eq!(ids_of(&page), vec![users[4].id.clone(), users[3].id.clone()]);
}

#[test]
fn list_applies_offset_and_descending_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let users = create_users_with_reversed_age(&conn, &repo, 5);

    let query = EntityListQuery {
        offset: 1,
        per_page: 2,
        direction: SortDirection::Desc,
        ..EntityListQuery::new("user")
    };
    let page = repo.list(&query).unwrap();

    assert_eq!(ids_of(&page), vec![users[1].id.clone(), users[2].id.clone()]);
}

#[test]
fn list_without_page_size_returns_remaining_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let users = create_users_with_reversed_age(&conn, &repo, 3);

    let all = repo.list(&EntityListQuery::new("user")).unwrap();
    assert_eq!(all.len(), 3);

    let tail = repo
        .list(&EntityListQuery {
            offset: 2,
            ..EntityListQuery::new("user")
        })
        .unwrap();
    assert_eq!(ids_of(&tail), vec![users[0].id.clone()]);
}

#[test]
fn list_breaks_timestamp_ties_by_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let first = repo.create("user").unwrap();
    let second = repo.create("user").unwrap();
    let third = repo.create("user").unwrap();
    conn.execute("UPDATE entities SET created_at = 1700000000000;", [])
        .unwrap();

    let page = repo.list(&EntityListQuery::new("user")).unwrap();
    assert_eq!(ids_of(&page), vec![first.id, second.id, third.id]);
}

#[test]
fn list_accepts_but_ignores_search() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    repo.create("user").unwrap();
    repo.create("user").unwrap();

    let query = EntityListQuery {
        search: Some("anything".to_string()),
        ..EntityListQuery::new("user")
    };
    assert_eq!(repo.list(&query).unwrap().len(), 2);
}

#[test]
fn list_excludes_deleted_entities() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let kept = repo.create("user").unwrap();
    let deleted = repo.create("user").unwrap();
    repo.delete(&deleted.id).unwrap();

    let page = repo.list(&EntityListQuery::new("user")).unwrap();
    assert_eq!(ids_of(&page), vec![kept.id]);
}

#[test]
fn ordering_inputs_are_whitelisted() {
    assert_eq!(
        EntityOrderColumn::from_str("UPDATED_AT").unwrap(),
        EntityOrderColumn::UpdatedAt
    );
    assert_eq!(
        EntityOrderColumn::from_str("created_at; DROP TABLE entities"),
        Err(ValidationError::UnsupportedOrderColumn(
            "created_at; DROP TABLE entities".to_string()
        ))
    );
    assert_eq!(SortDirection::from_str(" Desc ").unwrap(), SortDirection::Desc);
    assert!(matches!(
        SortDirection::from_str("sideways"),
        Err(ValidationError::UnsupportedSortDirection(_))
    ));
}

#[test]
fn count_tracks_live_entities_per_type() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();
    let first = repo.create("user").unwrap();
    repo.create("user").unwrap();
    repo.create("order").unwrap();

    assert_eq!(repo.count("user").unwrap(), 2);
    assert_eq!(repo.count("order").unwrap(), 1);
    assert_eq!(repo.count("invoice").unwrap(), 0);

    repo.delete(&first.id).unwrap();
    assert_eq!(repo.count("user").unwrap(), 1);
}

/// Creates `count` users, then rewrites `created_at` so the last one created
/// is the oldest.
fn create_users_with_reversed_age(
    conn: &Connection,
    repo: &SqliteEntityRepository<'_>,
    count: usize,
) -> Vec<Entity> {
    let users: Vec<Entity> = (0..count).map(|_| repo.create("user").unwrap()).collect();
    for (index, user) in users.iter().enumerate() {
        let created_at = 1_700_000_000_000_i64 + 1_000 * (count - index) as i64;
        conn.execute(
            "UPDATE entities SET created_at = ?1 WHERE id = ?2;",
            rusqlite::params![created_at, user.id],
        )
        .unwrap();
    }
    users
}

fn ids_of(entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|entity| entity.id.clone()).collect()
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
