/// Strategy for turning an image identifier into an object key
pub trait ObjectKeyStrategy: Send + Sync {
    fn object_key(&self, image_id: &str) -> String;
}

/// `md5hex(stem)-{image_id}`, where the stem is the identifier without its
/// format suffix.
///
/// Sequential identifiers share long prefixes, which concentrates writes on
/// one key range of the backing store. Leading with a digest spreads them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardedKeyStrategy;

impl ShardedKeyStrategy {
    /// 32 lowercase hex chars.
    pub fn checksum(image_id: &str) -> String {
        format!("{:x}", md5::compute(stem(image_id).as_bytes()))
    }
}

impl ObjectKeyStrategy for ShardedKeyStrategy {
    fn object_key(&self, image_id: &str) -> String {
        format!("{}-{}", Self::checksum(image_id), image_id)
    }
}

fn stem(image_id: &str) -> &str {
    image_id
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(image_id)
}
