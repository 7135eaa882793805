use super::{KeyMaterial, KeySource, KeySourceError};

/// Key supplied directly by the caller.
///
/// The key is not validated here, decoding errors surface when the wallet is
/// built.
#[derive(Debug, Clone)]
pub struct PlainKeySource {
    private_key: KeyMaterial,
}

impl PlainKeySource {
    pub fn new(private_key: impl Into<KeyMaterial>) -> Self {
        Self {
            private_key: private_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl KeySource for PlainKeySource {
    async fn private_key(&self) -> Result<KeyMaterial, KeySourceError> {
        Ok(self.private_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_the_same_key_every_time() -> eyre::Result<()> {
        let source = PlainKeySource::new("not even a key");

        for _ in 0..3 {
            assert_eq!(
                source.private_key().await?,
                KeyMaterial::from("not even a key")
            );
        }

        Ok(())
    }
}
