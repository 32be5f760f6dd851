//! Report prompt builder
//!
//! Turns a financial summary into a fixed-template instruction for the
//! generation backend. Pure: identical input gives byte-identical output.

use crate::models::{FinancialSummary, ReportPrompt};

/// Build the report prompt for a summary
pub fn build_prompt(summary: &FinancialSummary) -> ReportPrompt {
    let text = format!(
        r#"Anda adalah sebuah API service yang tugasnya menganalisis data keuangan dan mengembalikan HANYA format JSON string yang valid.

Analisis data berikut:
- Total Pemasukan: Rp {income}
- Total Pengeluaran: Rp {expense}
- Kategori pengeluaran terbesar: "{category}"

Buat ringkasan dan 2-3 saran praktis dalam format Markdown, ditulis dalam Bahasa Indonesia.

PENTING:
- Output Anda HARUS berupa satu JSON string tunggal dengan tepat dua field: "summary" dan "advice".
- Jangan tulis teks pembuka atau penutup apa pun di luar JSON.
- Pastikan semua tanda kutip (") di dalam teks Markdown di-escape dengan benar menggunakan backslash (\").
- Tulis "advice" sebagai daftar bernomor ("1. ", "2. ", ...) yang dipisahkan dengan \n.

Contoh input:
- Total Pemasukan: Rp 8.000.000
- Total Pengeluaran: Rp 6.500.000
- Kategori pengeluaran terbesar: "Makanan"

Contoh output:
{{"summary": "Bulan ini Anda menyisihkan **Rp 1.500.000** dari pemasukan. Pengeluaran terbesar ada di kategori **Makanan**, jadi di sanalah ruang penghematan paling besar.", "advice": "1. **Batasi makan di luar** menjadi dua kali seminggu.\n2. **Bangun dana darurat** dengan menyisihkan 10% pemasukan di awal bulan.\n3. **Catat setiap transaksi** agar pola belanja mudah dievaluasi."}}

Sekarang analisis data di atas dan kembalikan JSON-nya saja."#,
        income = format_rupiah(summary.whole_income()),
        expense = format_rupiah(summary.whole_expense()),
        category = summary.top_category(),
    );

    ReportPrompt::new(text)
}

/// Format whole rupiah with id-ID digit grouping: `1500000` -> `1.500.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if amount < 0 {
        grouped.push('-');
    }

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_EXPENSE_CATEGORY;

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(0), "0");
        assert_eq!(format_rupiah(999), "999");
        assert_eq!(format_rupiah(1000), "1.000");
        assert_eq!(format_rupiah(1_500_000), "1.500.000");
        assert_eq!(format_rupiah(-25_000), "-25.000");
        assert_eq!(format_rupiah(i64::MIN), "-9.223.372.036.854.775.808");
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let summary = FinancialSummary::new(7_250_000.0, 4_100_500.5, "Belanja");
        let first = build_prompt(&summary);
        let second = build_prompt(&summary);

        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_prompt_embeds_figures() {
        let summary = FinancialSummary::new(7_250_000.99, 4_100_500.5, "Belanja");
        let prompt = build_prompt(&summary);

        assert!(prompt.as_str().contains("Total Pemasukan: Rp 7.250.000\n"));
        assert!(prompt.as_str().contains("Total Pengeluaran: Rp 4.100.500\n"));
        assert!(prompt.as_str().contains("Kategori pengeluaran terbesar: \"Belanja\""));
        assert!(prompt.as_str().contains("\"summary\""));
        assert!(prompt.as_str().contains("\"advice\""));
    }

    #[test]
    fn test_prompt_uses_sentinel_for_blank_category() {
        let summary = FinancialSummary::new(1_000_000.0, 0.0, "");
        let prompt = build_prompt(&summary);

        assert!(prompt
            .as_str()
            .contains(&format!("Kategori pengeluaran terbesar: \"{}\"", NO_EXPENSE_CATEGORY)));
    }

    #[test]
    fn test_few_shot_example_is_valid_json() {
        let prompt = build_prompt(&FinancialSummary::new(1.0, 1.0, "Lainnya"));
        let text = prompt.as_str();
        let start = text.find("{\"summary\"").unwrap();
        let end = text[start..].find("}\n").unwrap() + start;

        let example: crate::models::StructuredReport =
            serde_json::from_str(&text[start..=end]).unwrap();
        assert!(example.advice.starts_with("1. "));
    }
}
