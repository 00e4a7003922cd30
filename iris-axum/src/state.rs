use std::sync::Arc;

use iris_blob::{TransportRegistry, UrlBuilder, UrlSigner};
use iris_core::{
    BufferPool, DimensionLimits, IdGenerator, ImageFormat, IrisConfig, IrisError, PoolSettings,
    ProcessingOptions, Transformer,
};

use crate::ApiError;

/// Process-wide collaborators shared by every request.
///
/// Everything here is built once at startup and read-only afterwards, except
/// for the pool and the generator which carry their own locks.
#[derive(Clone)]
pub struct IrisState {
    pub config: Arc<IrisConfig>,
    pub pool: Arc<BufferPool>,
    pub ids: Arc<IdGenerator>,
    pub registry: Arc<TransportRegistry>,
    pub urls: Arc<UrlBuilder>,
    pub transformer: Arc<dyn Transformer>,
    pub options: Arc<ProcessingOptions>,
    pub limits: DimensionLimits,
    /// Suffix of generated identifiers, from `storage.format`.
    pub id_extension: &'static str,
}

impl IrisState {
    pub fn new(
        config: IrisConfig,
        ids: IdGenerator,
        registry: TransportRegistry,
        transformer: Arc<dyn Transformer>,
        signer: Option<UrlSigner>,
    ) -> Self {
        let pool = BufferPool::new(PoolSettings::from_config("upload", &config.server));
        let urls = UrlBuilder::from_config(&config, signer);
        let options = ProcessingOptions::from_config(&config.image);
        let limits = DimensionLimits::from_config(&config.image);
        let id_extension = config
            .storage
            .format
            .parse::<ImageFormat>()
            .map(|f| f.extension())
            .unwrap_or("jpg");

        Self {
            config: Arc::new(config),
            pool,
            ids: Arc::new(ids),
            registry: Arc::new(registry),
            urls: Arc::new(urls),
            transformer,
            options: Arc::new(options),
            limits,
            id_extension,
        }
    }

    pub fn debug(&self) -> bool {
        self.config.server.debug
    }

    /// Attach the debug flag so the response renders the right message.
    pub fn api_error(&self, error: IrisError) -> ApiError {
        ApiError::new(error, self.debug())
    }
}

impl std::fmt::Debug for IrisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrisState")
            .field("pool", &self.pool)
            .field("registry", &self.registry)
            .field("urls", &self.urls)
            .field("transformer", &self.transformer.name())
            .finish_non_exhaustive()
    }
}
