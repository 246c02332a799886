//! Minimal saga participant: a route table that swaps atomically.
//!
//! Run with: cargo run --example custom-participant

use std::sync::{Arc, RwLock};

use firelynx_server::prelude::*;

/// Routing table that observes configuration through the saga: staging
/// builds a pending table, activation swaps it into use, compensation
/// throws the pending table away.
#[derive(Default)]
struct RouteTable {
    pending: RwLock<Option<Vec<String>>>,
    active: RwLock<Vec<String>>,
}

impl RouteTable {
    fn routes(&self) -> Vec<String> {
        self.active.read().unwrap().clone()
    }
}

#[async_trait]
impl Participant for RouteTable {
    fn name(&self) -> &str {
        "route-table"
    }

    async fn stage_config(&self, _ctx: &SagaContext, tx: &Transaction) -> Result<()> {
        let mut table = Vec::new();
        for endpoint in &tx.config().endpoints {
            for route in endpoint.http_routes() {
                table.push(format!(
                    "{} {} -> {}",
                    endpoint.listener_id, route.path, route.app_id
                ));
            }
        }
        *self.pending.write().unwrap() = Some(table);
        Ok(())
    }

    async fn activate_pending(&self, _ctx: &SagaContext) -> Result<()> {
        if let Some(table) = self.pending.write().unwrap().take() {
            *self.active.write().unwrap() = table;
        }
        Ok(())
    }

    async fn compensate(&self, _ctx: &SagaContext, _tx: &Transaction) -> Result<()> {
        self.pending.write().unwrap().take();
        Ok(())
    }
}

const CONFIG: &str = r#"
version = "v1"

[[listeners]]
id = "main"
address = ":8080"

[listeners.http]

[[endpoints]]
id = "e1"
listener_id = "main"

[[endpoints.routes]]
app_id = "a1"
http_path = "/echo"

[[apps]]
id = "a1"

[apps.echo]
response = "hi"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&LogConfig::default())?;

    let table = Arc::new(RouteTable::default());
    let orchestrator = Arc::new(SagaOrchestrator::new(vec![table.clone()]));

    let document = loader::load_str(CONFIG)?;
    let config = Arc::new(wire::from_wire(&document)?);
    let tx = Arc::new(Transaction::from_test("example", config));

    orchestrator.apply(tx, CancellationToken::new()).await?;

    for route in table.routes() {
        println!("{}", route);
    }

    Ok(())
}
