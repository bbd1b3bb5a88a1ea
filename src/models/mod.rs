pub mod asset;

pub use asset::{
    CreateAssetRequest, NewQrAsset, PixelShape, QrAsset, TemplateData, TemplateUpload,
    UpdateAssetRequest, UploadDesignRequest,
};
