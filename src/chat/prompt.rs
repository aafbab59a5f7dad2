//! System-prompt assembly from retrieved knowledge.

use crate::knowledge::{ContentType, RetrievalContext, VectorSearchResult};
use crate::locale::Locale;

/// Separator placed between rendered context blocks.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const DEFAULT_CURRENCY: &str = "EUR";

/// Render retrieved chunks as numbered blocks, or a localized placeholder when none matched.
pub fn render_context(context: &RetrievalContext, locale: Locale) -> String {
    if context.is_empty() {
        return locale.messages().no_context.to_string();
    }

    context
        .results()
        .iter()
        .enumerate()
        .map(|(index, hit)| render_block(index + 1, hit))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn render_block(number: usize, hit: &VectorSearchResult) -> String {
    let chunk = &hit.chunk;
    let title = if chunk.source_title.trim().is_empty() {
        chunk.source_id.as_str()
    } else {
        chunk.source_title.as_str()
    };

    let mut block = format!("[{number}] {title}\n{}", chunk.text.trim());
    if chunk.content_type == ContentType::Product {
        if let Some(price) = chunk.price {
            let currency = chunk
                .product
                .as_ref()
                .and_then(|product| product.get("currency"))
                .and_then(|currency| currency.as_str())
                .unwrap_or(DEFAULT_CURRENCY);
            block.push_str(&format!("\nPrice: {price:.2} {currency}"));
        }
        if let Some(image) = chunk.image_url.as_deref().filter(|url| !url.is_empty()) {
            block.push_str(&format!("\nImage: {image}"));
        }
    }
    block.push_str(&format!("\nRelevance: {}%", hit.relevance_percent()));
    block
}

/// Fixed per-locale system prompt with `context` interpolated.
pub fn build_system_prompt(locale: Locale, context: &str) -> String {
    let decline = locale.messages().off_topic;
    let tag = locale.as_str();
    match locale {
        Locale::En => format!(
            "You are the virtual assistant of a flooring retailer. You help customers choose \
floors, understand our products and plan their interiors.

TOPIC
- Only answer questions about flooring, our products, installation, care and interior design.
- If the question is about anything else, reply with exactly the following message and nothing \
else:
{decline}

CAPABILITIES
- You cannot send e-mails, create files, place orders or perform any other action.
- For quotes or a personal consultation, point the customer to the contact page: /{tag}/contact
- For free samples, point the customer to the samples page: /{tag}/samples
- For the full range, point the customer to the catalog: /{tag}/catalog

GROUNDING
- Answer only from the context below. If it does not contain the answer, say so and suggest \
the contact page.
- Never invent products, prices, specifications or availability.
- Reply in English, briefly and in a friendly tone.

CONTEXT
{context}"
        ),
        Locale::Bg => format!(
            "Вие сте виртуалният асистент на търговец на подови настилки. Помагате на клиентите \
да изберат настилка, да разберат продуктите ни и да планират интериора си.

ТЕМА
- Отговаряйте само на въпроси за подови настилки, нашите продукти, монтаж, поддръжка и \
интериорен дизайн.
- Ако въпросът е за нещо друго, отговорете точно със следното съобщение и нищо друго:
{decline}

ВЪЗМОЖНОСТИ
- Не можете да изпращате имейли, да създавате файлове, да правите поръчки или други действия.
- За оферти или лична консултация насочете клиента към страницата за контакт: /{tag}/contact
- За безплатни мостри насочете клиента към страницата за мостри: /{tag}/samples
- За цялата гама насочете клиента към каталога: /{tag}/catalog

ДОСТОВЕРНОСТ
- Отговаряйте само въз основа на контекста по-долу. Ако той не съдържа отговора, кажете го и \
предложете страницата за контакт.
- Никога не измисляйте продукти, цени, характеристики или наличности.
- Отговаряйте на български, кратко и приятелски.

КОНТЕКСТ
{context}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::VectorSearchResult;
    use crate::knowledge::types::fixtures::chunk;
    use serde_json::json;

    fn product_hit(similarity: f32) -> VectorSearchResult {
        let mut product = chunk("product:7", Locale::En, "Oak plank, 14mm, click installation.");
        product.content_type = ContentType::Product;
        product.source_title = "Oak Natural 14".into();
        product.price = Some(42.5);
        product.image_url = Some("https://cdn.test/oak.jpg".into());
        product.product = Some(json!({ "currency": "BGN" }));
        VectorSearchResult {
            id: "p".into(),
            chunk: product,
            similarity,
        }
    }

    fn page_hit(similarity: f32) -> VectorSearchResult {
        let mut page = chunk("page:/en/about", Locale::En, "We have sold floors since 1998.");
        page.source_title = String::new();
        VectorSearchResult {
            id: "g".into(),
            chunk: page,
            similarity,
        }
    }

    #[test]
    fn renders_numbered_blocks_with_product_details() {
        let context = RetrievalContext::from_unsorted(vec![page_hit(0.61), product_hit(0.874)], 5);
        let rendered = render_context(&context, Locale::En);
        assert_eq!(
            rendered,
            "[1] Oak Natural 14\nOak plank, 14mm, click installation.\nPrice: 42.50 BGN\n\
Image: https://cdn.test/oak.jpg\nRelevance: 87%\n\n---\n\n\
[2] page:/en/about\nWe have sold floors since 1998.\nRelevance: 61%"
        );
    }

    #[test]
    fn empty_context_renders_placeholder() {
        let rendered = render_context(&RetrievalContext::default(), Locale::Bg);
        assert_eq!(rendered, Locale::Bg.messages().no_context);
    }

    #[test]
    fn price_defaults_to_euro() {
        let mut hit = product_hit(0.5);
        hit.chunk.product = None;
        let rendered = render_context(&RetrievalContext::from_unsorted(vec![hit], 1), Locale::En);
        assert!(rendered.contains("Price: 42.50 EUR"));
    }

    #[test]
    fn system_prompt_embeds_decline_redirects_and_context() {
        for locale in Locale::ALL {
            let prompt = build_system_prompt(locale, "[1] Oak\nOak plank");
            assert!(prompt.contains(locale.messages().off_topic));
            assert!(prompt.contains(&format!("/{locale}/contact")));
            assert!(prompt.contains(&format!("/{locale}/samples")));
            assert!(prompt.contains(&format!("/{locale}/catalog")));
            assert!(prompt.ends_with("[1] Oak\nOak plank"));
        }
    }
}
