use crate::capture::{CaptureMode, CaptureRequest, CaptureSource};
use crate::image::{ImageLoader, RawImage};
use crate::utils::error::RoastError;
use crate::Result;
use async_trait::async_trait;

/// 用户选择的本地文件；解码后即撤销
#[derive(Debug)]
pub struct SelectedFile {
    name: Option<String>,
    content_type: Option<String>,
    bytes: Option<Vec<u8>>,
}

impl SelectedFile {
    pub fn new(bytes: Vec<u8>, name: Option<String>, content_type: Option<String>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(RoastError::InvalidInput("Empty file".to_string()));
        }

        let content_type = match content_type {
            Some(content_type) if content_type.starts_with("image/") => content_type,
            // 浏览器无法识别类型时上报 octet-stream
            Some(content_type) if content_type != "application/octet-stream" => {
                return Err(RoastError::UnsupportedFormat(content_type))
            }
            _ => ImageLoader::sniff_content_type(&bytes)?,
        };

        Ok(Self {
            name,
            content_type: Some(content_type),
            bytes: Some(bytes),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_revoked(&self) -> bool {
        self.bytes.is_none()
    }

    /// 撤销句柄并释放文件数据
    pub fn revoke(&mut self) {
        if self.bytes.take().is_some() {
            tracing::debug!("Revoked selected file {:?}", self.name);
        }
    }

    fn take_bytes(&mut self) -> Result<Vec<u8>> {
        self.bytes
            .take()
            .ok_or_else(|| RoastError::InvalidImage("selected file was already revoked".to_string()))
    }
}

/// 文件上传采集
pub struct FileCapture {
    selected: Option<SelectedFile>,
    max_size: usize,
}

impl FileCapture {
    pub fn new(max_size: usize) -> Self {
        Self {
            selected: None,
            max_size,
        }
    }

    pub fn has_selection(&self) -> bool {
        self.selected.as_ref().is_some_and(|f| !f.is_revoked())
    }
}

#[async_trait]
impl CaptureSource for FileCapture {
    fn mode(&self) -> CaptureMode {
        CaptureMode::File
    }

    async fn start(&mut self, request: CaptureRequest) -> Result<()> {
        let file = match request {
            CaptureRequest::File(file) => file,
            CaptureRequest::Camera => {
                return Err(RoastError::InvalidInput(
                    "camera capture is not available in file mode".to_string(),
                ))
            }
        };

        if file.len() > self.max_size {
            return Err(RoastError::FileTooLarge(file.len(), self.max_size));
        }

        self.release();
        tracing::info!(
            "File selected: name={:?}, type={:?}, size={}",
            file.name(),
            file.content_type(),
            file.len()
        );
        self.selected = Some(file);
        Ok(())
    }

    async fn produce_still_image(&mut self) -> Result<RawImage> {
        let mut file = self
            .selected
            .take()
            .ok_or_else(|| RoastError::InvalidInput("No image file selected".to_string()))?;
        let bytes = file.take_bytes();
        file.revoke();
        let bytes = bytes?;

        let max_size = self.max_size;
        let image = tokio::task::spawn_blocking(move || ImageLoader::from_bytes(&bytes, max_size))
            .await
            .map_err(|e| RoastError::Internal(format!("image decode task failed: {}", e)))??;

        if image.is_empty() {
            return Err(RoastError::InvalidImage(format!(
                "decoded image has zero dimension: {}x{}",
                image.width(),
                image.height()
            )));
        }

        tracing::info!("Decoded uploaded image {}x{}", image.width(), image.height());
        Ok(image)
    }

    fn release(&mut self) {
        if let Some(mut file) = self.selected.take() {
            file.revoke();
        }
    }

    fn is_active(&self) -> bool {
        false
    }
}
