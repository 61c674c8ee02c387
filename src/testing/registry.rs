use std::{future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};
use tracing::{error, info};

use crate::{bucket::Bucket, testing::clock::Clock};

/// What each registered test gets: a fresh, empty bucket and a clock that
/// agrees with the bucket's notion of time.
#[derive(Clone)]
pub struct BucketTestDeps {
    pub bucket: Arc<dyn Bucket>,
    pub clock: Arc<dyn Clock>,
}

type TestFn = Arc<dyn Fn(BucketTestDeps) -> BoxFuture<'static, ()> + Send + Sync>;

/// A single named test. It fails by panicking.
#[derive(Clone)]
pub struct TestFunction {
    pub name: &'static str,
    run: TestFn,
}

#[derive(Clone)]
pub struct TestSuite {
    pub name: &'static str,
    pub functions: Vec<TestFunction>,
}

pub struct SuiteBuilder {
    suite: TestSuite,
}

impl SuiteBuilder {
    pub fn new(name: &'static str) -> Self {
        Self {
            suite: TestSuite {
                name,
                functions: Vec::new(),
            },
        }
    }

    pub fn test<F, Fut>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(BucketTestDeps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.suite.functions.push(TestFunction {
            name,
            run: Arc::new(move |deps| f(deps).boxed()),
        });
        self
    }

    pub fn build(self) -> TestSuite {
        self.suite
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub passed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered suites of bucket behaviour tests.
#[derive(Clone, Default)]
pub struct Registry {
    suites: Vec<TestSuite>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, suite: TestSuite) -> Self {
        self.suites.push(suite);
        self
    }

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// Run every test in registration order. `make_deps` is called once per
    /// test, so no test sees another's objects. Each test runs on its own
    /// task and a panic is recorded as a failure.
    pub async fn run<F>(&self, make_deps: F) -> Report
    where
        F: Fn() -> BucketTestDeps,
    {
        let mut report = Report::default();

        for suite in &self.suites {
            for function in &suite.functions {
                let full_name = format!("{}.{}", suite.name, function.name);
                let deps = make_deps();

                match tokio::spawn((function.run)(deps)).await {
                    Ok(()) => {
                        info!(test=%full_name, "passed");
                        report.passed.push(full_name);
                    }
                    Err(err) => {
                        let message = panic_message(err);
                        error!(test=%full_name, error_message=%message, "failed");
                        report.failed.push((full_name, message));
                    }
                }
            }
        }

        report
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }

    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
