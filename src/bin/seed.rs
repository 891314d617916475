//! Seed script for development. Populates a fresh database with sample data.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` (reads .env).

use chrono::{Duration, Utc};
use sqlx::PgPool;

const ADMIN_PASSWORD: &str = "Test123!";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = pulsedesk::db::create_pool(&db_url, 5).await?;

    // Run migrations first
    pulsedesk::db::run_migrations(&pool).await?;

    println!("=== pulsedesk Seed Script ===");

    seed_admin(&pool).await?;
    seed_posts(&pool).await?;
    seed_users(&pool).await?;

    println!("\n=== Seed complete! ===");
    println!("Admin login: admin / {ADMIN_PASSWORD}");

    Ok(())
}

async fn seed_admin(pool: &PgPool) -> anyhow::Result<()> {
    let hash = pulsedesk::services::verifier::hash_password(ADMIN_PASSWORD)?;

    // Both columns are filled so either credential scheme works.
    sqlx::query(
        "INSERT INTO admin (username, password, password_hash)
         VALUES ('admin', $1, $2)
         ON CONFLICT (username) DO UPDATE
             SET password = EXCLUDED.password,
                 password_hash = EXCLUDED.password_hash",
    )
    .bind(ADMIN_PASSWORD)
    .bind(&hash)
    .execute(pool)
    .await?;

    println!("[done] Upserted admin account");
    Ok(())
}

async fn seed_posts(pool: &PgPool) -> anyhow::Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        println!("[skip] Posts already exist ({count})");
        return Ok(());
    }

    let posts = [
        ("Welcome to the blog", "welcome.jpg"),
        ("Spring product update", "spring-update.jpg"),
        ("Behind the scenes", "behind-the-scenes.jpg"),
        ("Community highlights", "community.jpg"),
        ("Roadmap for the year", "roadmap.jpg"),
        ("Tips for new members", "tips.jpg"),
        ("Year in review", "year-in-review.jpg"),
    ];

    let now = Utc::now();
    for (days_ago, (title, image)) in posts.iter().enumerate() {
        sqlx::query("INSERT INTO posts (title, image_url, published_at) VALUES ($1, $2, $3)")
            .bind(*title)
            .bind(*image)
            .bind(now - Duration::days(days_ago as i64))
            .execute(pool)
            .await?;
    }

    println!("[done] Created {} sample posts", posts.len());
    Ok(())
}

async fn seed_users(pool: &PgPool) -> anyhow::Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        println!("[skip] Users already exist ({count})");
        return Ok(());
    }

    let users = [
        ("Ada", "ada@example.com"),
        ("Grace", "grace@example.com"),
        ("Linus", "linus@example.com"),
    ];

    for (name, email) in users {
        sqlx::query("INSERT INTO users (name, email) VALUES ($1, $2)")
            .bind(name)
            .bind(email)
            .execute(pool)
            .await?;
    }

    println!("[done] Created {} sample users", users.len());
    Ok(())
}
