#![allow(dead_code)]

pub mod mock_tools {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use zonegen::error::RunnerError;
    use zonegen::process::{CommandSpec, ProcessOutput, ToolRunner};

    type Handler = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput, RunnerError> + Send + Sync>;

    /// Scripted stand-in for the external generator tools.
    ///
    /// Records every command it is asked to run and delegates the outcome
    /// to the supplied handler, so tests can assert on exact invocations
    /// and simulate tool behavior (including writing output files).
    pub struct MockRunner {
        calls: Mutex<Vec<CommandSpec>>,
        handler: Handler,
    }

    impl MockRunner {
        pub fn with<F>(handler: F) -> Arc<Self>
        where
            F: Fn(&CommandSpec) -> Result<ProcessOutput, RunnerError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                handler: Box::new(handler),
            })
        }

        /// A runner whose every invocation succeeds without side effects.
        pub fn ok() -> Arc<Self> {
            Self::with(|_| Ok(ProcessOutput::ok()))
        }

        /// Every command recorded so far, in invocation order.
        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolRunner for MockRunner {
        fn run(
            &self,
            spec: &CommandSpec,
            _timeout: Duration,
        ) -> Result<ProcessOutput, RunnerError> {
            self.calls.lock().unwrap().push(spec.clone());
            (self.handler)(spec)
        }
    }

    /// The value following `flag` in a recorded command's arguments.
    pub fn arg_value(spec: &CommandSpec, flag: &str) -> Option<String> {
        let mut args = spec.args.iter();
        while let Some(arg) = args.next() {
            if arg == flag {
                return args.next().cloned();
            }
        }
        None
    }
}

pub mod fixtures {
    use std::path::Path;
    use zonegen::config::GenerationConfig;
    use zonegen::routing::{RouteManifest, RoutePattern};
    use zonegen::zone::ZoneConfig;

    /// Two-zone configuration rooted at `base`: `billing` owns the
    /// invoices and payments apps, `public` owns storefront.
    pub fn two_zone_config(base: &Path) -> GenerationConfig {
        let mut config = GenerationConfig::default();
        config.output.base_dir = base.to_path_buf();
        config.zones.insert(
            "billing".to_string(),
            ZoneConfig::with_apps(["invoices", "payments"]),
        );
        config.zones.insert(
            "public".to_string(),
            ZoneConfig::with_apps(["storefront"]),
        );
        config
    }

    /// Route manifest covering every app the two-zone config names.
    pub fn two_zone_manifest() -> RouteManifest {
        let mut manifest = RouteManifest::new();
        manifest.insert_app(
            "invoices",
            [
                RoutePattern::new("api/invoices/"),
                RoutePattern::named("api/invoices/<int:pk>/", "invoice-detail"),
            ],
        );
        manifest.insert_app("payments", [RoutePattern::new("api/payments/")]);
        manifest.insert_app("storefront", [RoutePattern::new("api/items/")]);
        manifest
    }
}
