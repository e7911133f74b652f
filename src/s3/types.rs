//! S3 bucket configuration payloads and error documents

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Policy language version accepted by S3 bucket policies
pub const POLICY_VERSION: &str = "2012-10-17";

/// Escape XML special characters into `buf`
pub(crate) fn xml_escape_into(buf: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(ch),
        }
    }
}

fn open_root(xml: &mut String, root: &str) {
    xml.push_str(XML_DECLARATION);
    xml.push('<');
    xml.push_str(root);
    xml.push_str(" xmlns=\"");
    xml.push_str(S3_XMLNS);
    xml.push_str("\">");
}

fn push_element(xml: &mut String, name: &str, value: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    xml_escape_into(xml, value);
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

/// Body of CreateBucket for buckets outside the implicit default region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBucketConfiguration {
    pub location_constraint: String,
}

impl CreateBucketConfiguration {
    pub fn new(location_constraint: impl Into<String>) -> Self {
        Self {
            location_constraint: location_constraint.into(),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(192);
        open_root(&mut xml, "CreateBucketConfiguration");
        push_element(&mut xml, "LocationConstraint", &self.location_constraint);
        xml.push_str("</CreateBucketConfiguration>");
        xml
    }
}

/// Public Access Block configuration for a bucket.
///
/// `true` blocks the corresponding kind of public access. New buckets start
/// with everything blocked, so a public website needs every flag cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAccessBlockConfiguration {
    /// Reject requests that carry public ACL grants
    pub block_public_acls: bool,
    /// Ignore public ACLs on the bucket and its objects
    pub ignore_public_acls: bool,
    /// Reject bucket policies that grant public access
    pub block_public_policy: bool,
    /// Restrict access to buckets with public policies to authorized principals
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    /// All four restrictions lifted
    pub fn allow_all() -> Self {
        Self {
            block_public_acls: false,
            ignore_public_acls: false,
            block_public_policy: false,
            restrict_public_buckets: false,
        }
    }

    /// True when no flag blocks public access
    pub fn is_fully_open(&self) -> bool {
        !(self.block_public_acls
            || self.ignore_public_acls
            || self.block_public_policy
            || self.restrict_public_buckets)
    }

    pub fn to_xml(&self) -> String {
        let flag = |b: bool| if b { "true" } else { "false" };
        let mut xml = String::with_capacity(384);
        open_root(&mut xml, "PublicAccessBlockConfiguration");
        push_element(&mut xml, "BlockPublicAcls", flag(self.block_public_acls));
        push_element(&mut xml, "IgnorePublicAcls", flag(self.ignore_public_acls));
        push_element(&mut xml, "BlockPublicPolicy", flag(self.block_public_policy));
        push_element(
            &mut xml,
            "RestrictPublicBuckets",
            flag(self.restrict_public_buckets),
        );
        xml.push_str("</PublicAccessBlockConfiguration>");
        xml
    }
}

/// Static website hosting configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfiguration {
    /// Suffix appended to requests for a directory (e.g. `index.html`)
    pub index_document: String,
    /// Object returned for 4xx errors
    pub error_document: String,
}

impl WebsiteConfiguration {
    pub fn new(index_document: impl Into<String>, error_document: impl Into<String>) -> Self {
        Self {
            index_document: index_document.into(),
            error_document: error_document.into(),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256);
        open_root(&mut xml, "WebsiteConfiguration");
        xml.push_str("<IndexDocument>");
        push_element(&mut xml, "Suffix", &self.index_document);
        xml.push_str("</IndexDocument><ErrorDocument>");
        push_element(&mut xml, "Key", &self.error_document);
        xml.push_str("</ErrorDocument></WebsiteConfiguration>");
        xml
    }
}

/// Bucket policy document (JSON)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketPolicy {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// One statement of a bucket policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: String,
    pub principal: String,
    pub action: String,
    pub resource: String,
}

impl BucketPolicy {
    /// Anonymous `s3:GetObject` on every object of `bucket`
    pub fn public_read(bucket: &str) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![PolicyStatement {
                sid: Some("PublicReadGetObject".to_string()),
                effect: "Allow".to_string(),
                principal: "*".to_string(),
                action: "s3:GetObject".to_string(),
                resource: object_arn(bucket),
            }],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// ARN covering all objects in `bucket`
pub fn object_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}/*", bucket)
}

/// `<Error>` document returned by S3 for failed requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
    pub resource: Option<String>,
}

impl ErrorDocument {
    /// Parse an S3 error body. Returns `None` when the body carries no error code.
    pub fn parse(xml_data: &[u8]) -> Option<Self> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut doc = ErrorDocument::default();
        let mut current_text = String::with_capacity(128);

        loop {
            match reader.read_event() {
                Ok(Event::Text(e)) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape().ok()?);
                }
                Ok(Event::End(e)) => {
                    match e.local_name().as_ref() {
                        b"Code" => doc.code = std::mem::take(&mut current_text),
                        b"Message" => doc.message = std::mem::take(&mut current_text),
                        b"RequestId" => doc.request_id = Some(std::mem::take(&mut current_text)),
                        b"Resource" => doc.resource = Some(std::mem::take(&mut current_text)),
                        _ => {}
                    }
                    current_text.clear();
                }
                Ok(Event::Eof) => break,
                Err(_) => return None,
                _ => {}
            }
        }

        if doc.code.is_empty() {
            None
        } else {
            Some(doc)
        }
    }
}
