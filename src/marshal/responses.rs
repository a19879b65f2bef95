//! Marshallers for the response family.

use super::{DataReader, DataWriter, Marshal};
use crate::{
    codec::CodecError,
    commands::{Response, ResponseBody, type_tag},
};

impl Marshal for Response {
    fn data_structure_type(&self) -> u8 { Response::data_structure_type(self) }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_u32(self.correlation_id);
        match &self.body {
            ResponseBody::Empty => Ok(()),
            ResponseBody::Exception(error) => out.write_throwable(error.as_ref()),
            ResponseBody::Data(data) => out.write_nested(data.as_deref()),
            ResponseBody::Integer(result) => {
                out.write_i32(*result);
                Ok(())
            }
        }
    }
}

/// Decodes any response variant; `tag` selects the body layout.
pub(super) fn unmarshal_response(
    input: &mut DataReader<'_>,
    tag: u8,
) -> Result<Response, CodecError> {
    let header = input.read_command_header()?;
    let correlation_id = input.read_u32()?;
    let body = match tag {
        type_tag::EXCEPTION_RESPONSE => ResponseBody::Exception(input.read_throwable()?),
        type_tag::DATA_RESPONSE => ResponseBody::Data(input.read_nested_any()?.map(Box::new)),
        type_tag::INTEGER_RESPONSE => ResponseBody::Integer(input.read_i32()?),
        _ => ResponseBody::Empty,
    };
    Ok(Response {
        header,
        correlation_id,
        body,
    })
}
