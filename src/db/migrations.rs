//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! driver, and recorded in the `_migrations` table once applied.
//!
//! # Usage
//!
//! ```ignore
//! use rafa::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Foreign keys carry no cascading action: a row that is still referenced
//! cannot be removed, so the delete policy's dependents check is backed by
//! the database itself.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::pool::{self, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_organizations_and_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_federal VARCHAR(20) NOT NULL UNIQUE,
                nao_governamental BOOLEAN NOT NULL DEFAULT 0,
                url_logo VARCHAR(255),
                url_imagem VARCHAR(255),
                abertura VARCHAR(8) NOT NULL,
                fechamento VARCHAR(8) NOT NULL,
                intervalo VARCHAR(20) NOT NULL,
                nome VARCHAR(255) NOT NULL UNIQUE,
                descricao TEXT NOT NULL,
                rua VARCHAR(255) NOT NULL,
                cep VARCHAR(9) NOT NULL,
                cidade VARCHAR(100) NOT NULL,
                estado VARCHAR(2) NOT NULL,
                telefone VARCHAR(20) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                primeiro_nome VARCHAR(100) NOT NULL,
                sobrenome VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL UNIQUE,
                username VARCHAR(50) NOT NULL UNIQUE,
                senha_hash VARCHAR(255) NOT NULL,
                telefone VARCHAR(20) NOT NULL,
                id_organizacao INTEGER NOT NULL REFERENCES organizations(id),
                eh_deletado BOOLEAN NOT NULL DEFAULT 0,
                eh_voluntario BOOLEAN NOT NULL DEFAULT 0,
                eh_gerente BOOLEAN NOT NULL DEFAULT 0,
                deficiencia_auditiva BOOLEAN,
                usa_cadeira_rodas BOOLEAN,
                deficiencia_cognitiva BOOLEAN,
                lgbtq BOOLEAN,
                url_imagem_perfil VARCHAR(255),
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_id_organizacao ON users(id_organizacao);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                id_federal VARCHAR(20) NOT NULL UNIQUE,
                nao_governamental BOOLEAN NOT NULL DEFAULT FALSE,
                url_logo VARCHAR(255) NULL,
                url_imagem VARCHAR(255) NULL,
                abertura VARCHAR(8) NOT NULL,
                fechamento VARCHAR(8) NOT NULL,
                intervalo VARCHAR(20) NOT NULL,
                nome VARCHAR(255) NOT NULL UNIQUE,
                descricao TEXT NOT NULL,
                rua VARCHAR(255) NOT NULL,
                cep VARCHAR(9) NOT NULL,
                cidade VARCHAR(100) NOT NULL,
                estado VARCHAR(2) NOT NULL,
                telefone VARCHAR(20) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

            CREATE TABLE IF NOT EXISTS users (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                primeiro_nome VARCHAR(100) NOT NULL,
                sobrenome VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL UNIQUE,
                username VARCHAR(50) NOT NULL UNIQUE,
                senha_hash VARCHAR(255) NOT NULL,
                telefone VARCHAR(20) NOT NULL,
                id_organizacao BIGINT NOT NULL,
                eh_deletado BOOLEAN NOT NULL DEFAULT FALSE,
                eh_voluntario BOOLEAN NOT NULL DEFAULT FALSE,
                eh_gerente BOOLEAN NOT NULL DEFAULT FALSE,
                deficiencia_auditiva BOOLEAN NULL,
                usa_cadeira_rodas BOOLEAN NULL,
                deficiencia_cognitiva BOOLEAN NULL,
                lgbtq BOOLEAN NULL,
                url_imagem_perfil VARCHAR(255) NULL,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL,
                INDEX idx_users_id_organizacao (id_organizacao),
                FOREIGN KEY (id_organizacao) REFERENCES organizations(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
        "#,
    },
    Migration {
        version: 2,
        name: "create_categories_posts_favorites",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                categoria VARCHAR(100) NOT NULL UNIQUE,
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item BOOLEAN NOT NULL,
                id_organizacao INTEGER NOT NULL REFERENCES organizations(id),
                id_usuario INTEGER NOT NULL REFERENCES users(id),
                titulo VARCHAR(255) NOT NULL,
                descricao TEXT NOT NULL,
                quantidade VARCHAR(50) NOT NULL,
                id_categoria INTEGER NOT NULL REFERENCES categories(id),
                url_imagem_post VARCHAR(255),
                data_validade DATE,
                status INTEGER NOT NULL DEFAULT 1,
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_id_organizacao ON posts(id_organizacao);
            CREATE INDEX IF NOT EXISTS idx_posts_id_usuario ON posts(id_usuario);
            CREATE INDEX IF NOT EXISTS idx_posts_id_categoria ON posts(id_categoria);
            CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);

            CREATE TABLE IF NOT EXISTS favorites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_postagem INTEGER NOT NULL REFERENCES posts(id),
                id_usuario INTEGER NOT NULL REFERENCES users(id),
                criado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_favorites_id_postagem ON favorites(id_postagem);
            CREATE INDEX IF NOT EXISTS idx_favorites_id_usuario ON favorites(id_usuario);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                categoria VARCHAR(100) NOT NULL UNIQUE,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

            CREATE TABLE IF NOT EXISTS posts (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                item BOOLEAN NOT NULL,
                id_organizacao BIGINT NOT NULL,
                id_usuario BIGINT NOT NULL,
                titulo VARCHAR(255) NOT NULL,
                descricao TEXT NOT NULL,
                quantidade VARCHAR(50) NOT NULL,
                id_categoria BIGINT NOT NULL,
                url_imagem_post VARCHAR(255) NULL,
                data_validade DATE NULL,
                status BIGINT NOT NULL DEFAULT 1,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL,
                INDEX idx_posts_id_organizacao (id_organizacao),
                INDEX idx_posts_id_usuario (id_usuario),
                INDEX idx_posts_id_categoria (id_categoria),
                INDEX idx_posts_status (status),
                FOREIGN KEY (id_organizacao) REFERENCES organizations(id),
                FOREIGN KEY (id_usuario) REFERENCES users(id),
                FOREIGN KEY (id_categoria) REFERENCES categories(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

            CREATE TABLE IF NOT EXISTS favorites (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                id_postagem BIGINT NOT NULL,
                id_usuario BIGINT NOT NULL,
                criado_em DATETIME NOT NULL,
                INDEX idx_favorites_id_postagem (id_postagem),
                INDEX idx_favorites_id_usuario (id_usuario),
                FOREIGN KEY (id_postagem) REFERENCES posts(id),
                FOREIGN KEY (id_usuario) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
        "#,
    },
    Migration {
        version: 3,
        name: "create_deliveries_events_calendars",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS deliveries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entrega_direta BOOLEAN NOT NULL,
                id_postagem INTEGER NOT NULL UNIQUE REFERENCES posts(id),
                id_usuario INTEGER NOT NULL REFERENCES users(id),
                id_organizacao INTEGER NOT NULL REFERENCES organizations(id),
                id_ong INTEGER NOT NULL REFERENCES organizations(id),
                data DATE NOT NULL,
                hora VARCHAR(8) NOT NULL,
                completo INTEGER NOT NULL DEFAULT 0,
                motivo_cancelamento TEXT,
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_deliveries_id_usuario ON deliveries(id_usuario);
            CREATE INDEX IF NOT EXISTS idx_deliveries_id_organizacao ON deliveries(id_organizacao);
            CREATE INDEX IF NOT EXISTS idx_deliveries_id_ong ON deliveries(id_ong);

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_organizacao INTEGER NOT NULL REFERENCES organizations(id),
                id_usuario INTEGER NOT NULL REFERENCES users(id),
                fechado TIMESTAMP NOT NULL,
                titulo VARCHAR(255) NOT NULL,
                descricao TEXT NOT NULL,
                data TIMESTAMP NOT NULL,
                url_imagem VARCHAR(255),
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_id_organizacao ON events(id_organizacao);
            CREATE INDEX IF NOT EXISTS idx_events_id_usuario ON events(id_usuario);

            CREATE TABLE IF NOT EXISTS calendars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_organizacao INTEGER NOT NULL UNIQUE REFERENCES organizations(id),
                abertura TIMESTAMP NOT NULL,
                fechamento TIMESTAMP NOT NULL,
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS deliveries (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                entrega_direta BOOLEAN NOT NULL,
                id_postagem BIGINT NOT NULL UNIQUE,
                id_usuario BIGINT NOT NULL,
                id_organizacao BIGINT NOT NULL,
                id_ong BIGINT NOT NULL,
                data DATE NOT NULL,
                hora VARCHAR(8) NOT NULL,
                completo BIGINT NOT NULL DEFAULT 0,
                motivo_cancelamento TEXT NULL,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL,
                INDEX idx_deliveries_id_usuario (id_usuario),
                INDEX idx_deliveries_id_organizacao (id_organizacao),
                INDEX idx_deliveries_id_ong (id_ong),
                FOREIGN KEY (id_postagem) REFERENCES posts(id),
                FOREIGN KEY (id_usuario) REFERENCES users(id),
                FOREIGN KEY (id_organizacao) REFERENCES organizations(id),
                FOREIGN KEY (id_ong) REFERENCES organizations(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

            CREATE TABLE IF NOT EXISTS events (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                id_organizacao BIGINT NOT NULL,
                id_usuario BIGINT NOT NULL,
                fechado DATETIME NOT NULL,
                titulo VARCHAR(255) NOT NULL,
                descricao TEXT NOT NULL,
                data DATETIME NOT NULL,
                url_imagem VARCHAR(255) NULL,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL,
                INDEX idx_events_id_organizacao (id_organizacao),
                INDEX idx_events_id_usuario (id_usuario),
                FOREIGN KEY (id_organizacao) REFERENCES organizations(id),
                FOREIGN KEY (id_usuario) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

            CREATE TABLE IF NOT EXISTS calendars (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                id_organizacao BIGINT NOT NULL UNIQUE,
                abertura DATETIME NOT NULL,
                fechamento DATETIME NOT NULL,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL,
                FOREIGN KEY (id_organizacao) REFERENCES organizations(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
        "#,
    },
    Migration {
        version: 4,
        name: "create_message_threads_and_messages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS message_threads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                usuario_um INTEGER NOT NULL REFERENCES users(id),
                usuario_dois INTEGER NOT NULL REFERENCES users(id),
                criado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_message_threads_usuario_um ON message_threads(usuario_um);
            CREATE INDEX IF NOT EXISTS idx_message_threads_usuario_dois ON message_threads(usuario_dois);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_conversa INTEGER NOT NULL REFERENCES message_threads(id),
                id_remetente INTEGER NOT NULL REFERENCES users(id),
                id_postagem INTEGER REFERENCES posts(id),
                conteudo TEXT NOT NULL,
                url_imagem VARCHAR(255),
                criado_em TIMESTAMP NOT NULL,
                atualizado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_id_conversa ON messages(id_conversa);
            CREATE INDEX IF NOT EXISTS idx_messages_id_remetente ON messages(id_remetente);
            CREATE INDEX IF NOT EXISTS idx_messages_id_postagem ON messages(id_postagem);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS message_threads (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                usuario_um BIGINT NOT NULL,
                usuario_dois BIGINT NOT NULL,
                criado_em DATETIME NOT NULL,
                INDEX idx_message_threads_usuario_um (usuario_um),
                INDEX idx_message_threads_usuario_dois (usuario_dois),
                FOREIGN KEY (usuario_um) REFERENCES users(id),
                FOREIGN KEY (usuario_dois) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;

            CREATE TABLE IF NOT EXISTS messages (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                id_conversa BIGINT NOT NULL,
                id_remetente BIGINT NOT NULL,
                id_postagem BIGINT NULL,
                conteudo TEXT NOT NULL,
                url_imagem VARCHAR(255) NULL,
                criado_em DATETIME NOT NULL,
                atualizado_em DATETIME NOT NULL,
                INDEX idx_messages_id_conversa (id_conversa),
                INDEX idx_messages_id_remetente (id_remetente),
                INDEX idx_messages_id_postagem (id_postagem),
                FOREIGN KEY (id_conversa) REFERENCES message_threads(id),
                FOREIGN KEY (id_remetente) REFERENCES users(id),
                FOREIGN KEY (id_postagem) REFERENCES posts(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
        "#,
    },
    Migration {
        version: 5,
        name: "create_watchlists",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS watchlists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_organizacao INTEGER REFERENCES organizations(id),
                id_usuario INTEGER REFERENCES users(id),
                endereco_ip VARCHAR(45),
                quantidade INTEGER NOT NULL DEFAULT 1,
                criado_em TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_watchlists_id_usuario ON watchlists(id_usuario);
            CREATE INDEX IF NOT EXISTS idx_watchlists_endereco_ip ON watchlists(endereco_ip);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS watchlists (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                id_organizacao BIGINT NULL,
                id_usuario BIGINT NULL,
                endereco_ip VARCHAR(45) NULL,
                quantidade BIGINT NOT NULL DEFAULT 1,
                criado_em DATETIME NOT NULL,
                INDEX idx_watchlists_id_usuario (id_usuario),
                INDEX idx_watchlists_endereco_ip (endereco_ip),
                FOREIGN KEY (id_organizacao) REFERENCES organizations(id),
                FOREIGN KEY (id_usuario) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
        "#,
    },
];

/// Run all pending migrations
///
/// # Returns
///
/// Number of migrations applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&i64::from(migration.version)) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool::sqlite(pool)?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool::mysql(pool)?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(MigrationRecord {
                version: row.try_get("version")?,
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()
        .context("Failed to read applied migrations")
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(MigrationRecord {
                version: row.try_get("version")?,
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()
        .context("Failed to read applied migrations")
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool::sqlite(pool)?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool::mysql(pool)?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(i64::from(migration.version))
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(i64::from(migration.version))
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((end, _)) => format!("{}...", &sql[..end]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with("--")
    })
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pending_count() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let pending = pending_count(&pool).await.expect("Failed to check");
        assert_eq!(pending, MIGRATIONS.len());

        run_migrations(&pool).await.expect("Failed to run migrations");
        let pending = pending_count(&pool).await.expect("Failed to check");
        assert_eq!(pending, 0);
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1, "{}", migration.name);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INTEGER);\n  -- comment only\n;\nCREATE INDEX i ON a(id);\n";
        assert_eq!(
            split_sql_statements(sql),
            vec!["CREATE TABLE a (id INTEGER)", "CREATE INDEX i ON a(id)"]
        );
    }

    #[tokio::test]
    async fn test_referenced_user_cannot_be_removed() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite_pool = pool.as_sqlite().unwrap();

        sqlx::query(
            "INSERT INTO organizations (id_federal, nao_governamental, abertura, fechamento, intervalo, \
             nome, descricao, rua, cep, cidade, estado, telefone, email, criado_em, atualizado_em) \
             VALUES ('1', 1, '08:00', '18:00', '12:00-13:00', 'ONG', 'd', 'r', '0', 'c', 'SP', '1', 'o@x', \
             CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .execute(sqlite_pool)
        .await
        .expect("Failed to create organization");
        sqlx::query(
            "INSERT INTO users (primeiro_nome, sobrenome, email, username, senha_hash, telefone, \
             id_organizacao, criado_em, atualizado_em) \
             VALUES ('Ana', 'S', 'a@x', 'ana', 'h', '1', 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .execute(sqlite_pool)
        .await
        .expect("Failed to create user");
        sqlx::query("INSERT INTO watchlists (id_usuario, quantidade, criado_em) VALUES (1, 1, CURRENT_TIMESTAMP)")
            .execute(sqlite_pool)
            .await
            .expect("Failed to create watchlist entry");

        let result = sqlx::query("DELETE FROM users WHERE id = 1")
            .execute(sqlite_pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_one_calendar_per_organization() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite_pool = pool.as_sqlite().unwrap();

        sqlx::query(
            "INSERT INTO organizations (id_federal, nao_governamental, abertura, fechamento, intervalo, \
             nome, descricao, rua, cep, cidade, estado, telefone, email, criado_em, atualizado_em) \
             VALUES ('1', 1, '08:00', '18:00', '12:00-13:00', 'ONG', 'd', 'r', '0', 'c', 'SP', '1', 'o@x', \
             CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .execute(sqlite_pool)
        .await
        .expect("Failed to create organization");

        let insert = "INSERT INTO calendars (id_organizacao, abertura, fechamento, criado_em, atualizado_em) \
                      VALUES (1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)";
        sqlx::query(insert).execute(sqlite_pool).await.expect("first calendar");
        assert!(sqlx::query(insert).execute(sqlite_pool).await.is_err());
    }
}
