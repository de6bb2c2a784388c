use stress_test::{stress_test_scaling, stress_test_sessions, StressConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            SESSION SYNC STRESS TESTS                       ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: a handful of sessions, mostly online
    let stats = stress_test_sessions(StressConfig {
        sessions: 4,
        sends_per_session: 50,
        flaps: 20,
        offline_bias: 0.2,
    })
    .await?;
    stats.print();

    // Test 2: more sessions, frequent connectivity loss
    let stats = stress_test_sessions(StressConfig {
        sessions: 10,
        sends_per_session: 200,
        flaps: 200,
        offline_bias: 0.5,
    })
    .await?;
    stats.print();

    // Test 3: scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (sessions)                       ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(16, 4).await?;

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
