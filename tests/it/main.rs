use cotest::*;

mod expectations;
mod launches;
mod matching;
mod priority;
mod scenarios;
mod usage;

#[mock(api = ServiceMock)]
pub trait Service {
    fn mock1(&self, i: i32) -> i32;
    fn mock2(&self);
    fn mock3(&self, name: String, n: u32) -> String;
}

pub fn example1(service: &impl Service, i: i32) -> i32 {
    service.mock1(i + 1) * 2
}

/// Log engine activity with `RUST_LOG=cotest=trace`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn main() {}
