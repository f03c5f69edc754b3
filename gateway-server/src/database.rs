use anyhow::anyhow;
use axum_table_gateway::Identifier;
use sqlx::sqlite::SqlitePool;

/// Create the demo table under `table` and seed it when empty
pub async fn setup(pool: &SqlitePool, table: &str) -> anyhow::Result<()> {
    let table = Identifier::parse(table)
        .ok_or_else(|| anyhow!("DEFAULT_TABLE_NAME {table:?} is not a valid table name"))?
        .quoted();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_name TEXT NOT NULL,
            age INTEGER,
            ward TEXT,
            diagnosis TEXT,
            status TEXT DEFAULT 'admitted',
            admitted_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await?;

    seed_sample_data(pool, &table).await?;

    Ok(())
}

async fn seed_sample_data(pool: &SqlitePool, table: &str) -> anyhow::Result<()> {
    let record_count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;

    if record_count.0 > 0 {
        // Data already seeded
        return Ok(());
    }

    let first_names = [
        "Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah",
        "Isaac", "Julia", "Kevin", "Laura",
    ];
    let last_names = [
        "Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "Taylor", "Anderson",
        "Thomas",
    ];
    let wards = ["cardiology", "oncology", "pediatrics", "icu", "maternity"];
    let diagnoses = ["fracture", "pneumonia", "arrhythmia", "observation", "migraine", "appendicitis"];
    let statuses = ["admitted", "discharged", "in_treatment"];

    let insert = format!(
        "INSERT INTO {table} (patient_name, age, ward, diagnosis, status) VALUES (?, ?, ?, ?, ?)"
    );

    for index in 0..40 {
        let first = first_names[index % first_names.len()];
        let last = last_names[index % last_names.len()];

        sqlx::query(&insert)
            .bind(format!("{} {}", first, last))
            .bind(((index * 17) % 90 + 1) as i64)
            .bind(wards[index % wards.len()])
            .bind(diagnoses[index % diagnoses.len()])
            .bind(statuses[index % statuses.len()])
            .execute(pool)
            .await?;
    }

    tracing::info!(table = %table, records = 40, "sample data seeded");
    Ok(())
}
