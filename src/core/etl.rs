use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        let name = self.pipeline.name();
        tracing::info!("🚀 Starting {} stage", name);
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting ({})...", name);
        let extracted = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Transforming ({})...", name);
        let transformed = self.pipeline.transform(extracted).await?;
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Loading ({})...", name);
        let output_path = self.pipeline.load(transformed).await?;
        self.monitor.log_stats("Load");

        tracing::info!("✅ {} stage done, output: {}", name, output_path);
        self.monitor.log_final_stats();
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use std::sync::Mutex;

    struct CountingPipeline {
        loaded: Mutex<Vec<usize>>,
        fail_transform: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for CountingPipeline {
        type Extracted = Vec<usize>;
        type Transformed = usize;

        fn name(&self) -> &str {
            "counting"
        }

        async fn extract(&self) -> Result<Vec<usize>> {
            Ok(vec![1, 2, 3])
        }

        async fn transform(&self, data: Vec<usize>) -> Result<usize> {
            if self.fail_transform {
                return Err(EtlError::processing("boom"));
            }
            Ok(data.iter().sum())
        }

        async fn load(&self, result: usize) -> Result<String> {
            self.loaded.lock().unwrap().push(result);
            Ok(format!("sum={}", result))
        }
    }

    #[test]
    fn test_engine_runs_phases_in_order() {
        let engine = EtlEngine::new(CountingPipeline {
            loaded: Mutex::new(Vec::new()),
            fail_transform: false,
        });

        let output = tokio_test::block_on(engine.run()).unwrap();
        assert_eq!(output, "sum=6");
        assert_eq!(*engine.pipeline().loaded.lock().unwrap(), vec![6]);
    }

    #[test]
    fn test_engine_stops_on_error() {
        let engine = EtlEngine::new(CountingPipeline {
            loaded: Mutex::new(Vec::new()),
            fail_transform: true,
        });

        assert!(tokio_test::block_on(engine.run()).is_err());
        assert!(engine.pipeline().loaded.lock().unwrap().is_empty());
    }
}
